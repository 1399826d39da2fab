// catalog module
pub mod catalog {
    pub mod workspace;
    pub mod in_memory;
}

// stitch module
pub mod stitch {
    pub mod error;
    pub mod params;
    pub mod operation;
    pub mod many;
}
