use bluer::Uuid;

// Remote control GATT profile, must match the peripheral firmware
pub const REMOTE_SERV_UUID: Uuid =
    Uuid::from_u128(0x12345678_1234_1234_1234_1234567890ab);
pub const REMOTE_CHAR_BUTTON_UUID: Uuid =
    Uuid::from_u128(0x12345678_1234_1234_1234_1234567890ac); //button press notifications
pub const REMOTE_CHAR_BATTERY_UUID: Uuid =
    Uuid::from_u128(0x12345678_1234_1234_1234_1234567890ad); //battery level notifications

//advertised name of the remote
pub const REMOTE_DEVICE_NAME: &str = "Remote-Switch";
