pub mod animation;
pub mod binding;
pub mod canvas;
pub mod color;
pub mod events;
mod host;
pub mod paging;
pub mod raster;
pub mod rect;
mod tree;
mod view;

pub use host::{Host, OpacitySurface};
pub use tree::{TreeError, ViewTree};
pub use view::{
    Delegate, DrawCallback, DrawInfo, LayoutOptions, Overlay, ViewId, ViewNode, EPSILON,
};
