pub mod access;
pub mod error;
pub mod horizon;
pub mod pipeline;
pub mod point;
pub mod report;
pub mod series;
pub mod settings;
pub mod site;
pub mod window;
