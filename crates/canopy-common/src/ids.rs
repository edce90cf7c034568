use uuid::Uuid;

pub fn new_device_id() -> Uuid {
    Uuid::new_v4()
}

pub fn new_conn_id() -> String {
    Uuid::new_v4().to_string()
}
