pub mod core {
    pub mod value;
}

pub mod records {
    pub mod batch;
    pub mod record;
    pub mod row;
}

pub mod execution {
    pub mod errors;
    pub mod failed_row;
}
