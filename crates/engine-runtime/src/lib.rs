pub mod actor {
    pub mod actor;
    pub mod logger;
    pub mod messages;
    pub mod spawn;
}

pub mod error;

pub mod execution {
    pub mod executor;
    pub mod factory;
    pub mod job;
}
