//! Translation of hotkey descriptors into X keysym chords.
//!
//! Descriptors use the notation the settings window stores: keys joined
//! with `+` form a chord, chords separated by `,` are pressed in sequence,
//! for example `"ctrl+c"`, `"volume up"` or `"alt+tab, enter"`.

use crate::error::KeyError;

fn keysym(name: &str) -> Option<&'static str> {
    let sym = match name {
        "ctrl" | "control" | "left ctrl" | "right ctrl" => "ctrl",
        "shift" | "left shift" | "right shift" => "shift",
        "alt" | "left alt" | "alt gr" | "right alt" => "alt",
        "windows" | "win" | "left windows" | "super" | "cmd" | "command" => {
            "super"
        }
        "pagedown" | "page down" | "next" => "Next",
        "pageup" | "page up" | "prior" => "Prior",
        "enter" | "return" => "Return",
        "esc" | "escape" => "Escape",
        "space" | "spacebar" => "space",
        "tab" => "Tab",
        "backspace" => "BackSpace",
        "delete" | "del" => "Delete",
        "insert" | "ins" => "Insert",
        "home" => "Home",
        "end" => "End",
        "left" | "left arrow" => "Left",
        "right" | "right arrow" => "Right",
        "up" | "up arrow" => "Up",
        "down" | "down arrow" => "Down",
        "print screen" | "printscreen" | "print" => "Print",
        "caps lock" | "capslock" => "Caps_Lock",
        "volume up" => "XF86AudioRaiseVolume",
        "volume down" => "XF86AudioLowerVolume",
        "volume mute" | "mute" => "XF86AudioMute",
        "play/pause media" | "play/pause" | "play pause" => "XF86AudioPlay",
        "stop media" => "XF86AudioStop",
        "next track" => "XF86AudioNext",
        "previous track" | "prev track" => "XF86AudioPrev",
        "plus" => "plus",
        "comma" => "comma",
        _ => return None,
    };
    Some(sym)
}

fn function_key(name: &str) -> Option<String> {
    let number: u8 = name.strip_prefix('f')?.parse().ok()?;
    (1..=24).contains(&number).then(|| format!("F{number}"))
}

fn translate_key(name: &str) -> String {
    if let Some(sym) = keysym(name) {
        return sym.to_string();
    }
    if let Some(fkey) = function_key(name) {
        return fkey;
    }
    //single characters and raw keysym names go through unchanged
    name.to_string()
}

/// Turns a descriptor into `xdotool key` arguments, one per chord.
pub fn to_key_chords(descriptor: &str) -> Result<Vec<String>, KeyError> {
    let descriptor = descriptor.trim();
    if descriptor.is_empty() {
        return Err(KeyError::EmptyDescriptor);
    }

    descriptor
        .split(',')
        .map(|chord| {
            chord
                .split('+')
                .map(|key| {
                    let key = key.trim().to_lowercase();
                    if key.is_empty() {
                        return Err(KeyError::EmptyKey(chord.trim().to_string()));
                    }
                    Ok(translate_key(&key))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(|keys| keys.join("+"))
        })
        .collect()
}
