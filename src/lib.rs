pub mod controller;
pub mod dataset;
pub mod domain;
pub mod export;
pub mod inputter;
pub mod loader;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod ui;
pub mod view;
