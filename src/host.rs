use crate::canvas::{Canvas, Image};

/// Connects a view tree to whatever owns the drawable surface.
///
/// The root view holds the host; all other views resolve it through their superviews.
pub trait Host: Send + Sync {
    /// Requests a repaint of the whole surface at the next frame.
    ///
    /// May be called many times per frame; implementations should coalesce.
    fn invalidate(&self);

    /// Creates an off-screen surface the size of the drawable surface.
    ///
    /// Used to paint translucent subtrees as one unit.
    fn create_opacity_surface(&self) -> Box<dyn OpacitySurface>;
}

/// An off-screen paint target.
///
/// Dropped right after its snapshot has been composited.
pub trait OpacitySurface {
    fn canvas(&mut self) -> &mut dyn Canvas;

    /// Captures the current contents.
    fn snapshot(&mut self) -> Image;
}
