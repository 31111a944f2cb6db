table! {
    rooms (room_id) {
        room_id -> Text,
        record -> Text,
    }
}
