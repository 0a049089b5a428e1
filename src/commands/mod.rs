pub mod check;
pub mod generate_labels;
pub mod inventory;
pub mod recommend;
pub mod setup_dataset;
pub mod status;
pub mod train;
