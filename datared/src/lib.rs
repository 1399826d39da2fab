// config module
pub mod config {
    pub mod dictionary;
    pub mod reduction;
}

// single crystal diffraction module
pub mod scd {
    pub mod strategy;
    pub mod toolkit;
    pub mod recorder;
    pub mod pipeline;
}

// dry runs without the host toolkit
pub mod dry_run;
