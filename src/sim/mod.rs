pub mod assets;
pub mod event;
pub mod flow;
pub mod level;
pub mod save;
pub mod step;
pub mod world;
