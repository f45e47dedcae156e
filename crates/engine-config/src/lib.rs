pub mod report {
    pub mod summary;
}

pub mod settings {
    pub mod error;
    pub mod job;
    pub mod spec;
}
