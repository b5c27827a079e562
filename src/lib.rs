//! Showreel is a headless scroll-choreography and animation-orchestration engine for
//! scroll-driven portfolio pages.
//!
//! The page is modelled as an element arena driven by a single clock:
//!
//! - Build a [`Stage`] from a [`ShowreelConfig`] and a [`Viewport`]
//! - Mount a [`PageLayout`] (about section, gated card gallery, horizontal strip)
//! - Feed it [`InputEvent`]s and advance time frame by frame
//! - Inspect the resulting [`Scene`] styles and [`StageSnapshot`]s
//!
//! Image effects (hover magnifier, pointer spotlight) render on a CPU [`RenderSurface`].
#![forbid(unsafe_code)]

pub mod anim;
pub mod anim_ease;
pub mod completion;
pub mod config;
pub mod core;
pub mod error;
pub mod gallery;
pub mod gesture;
pub mod handoff;
pub mod intro;
pub mod listeners;
pub mod observer;
pub mod parallax;
pub mod pinning;
pub mod runtime;
pub mod scene;
pub mod shader;
pub mod stage;
pub mod timeline;
pub mod timer;

pub use anim::{TweenEngine, TweenEvent, TweenId, TweenOpts, Tweener};
pub use anim_ease::Ease;
pub use completion::{CompletionReader, CompletionWriter, section_completion};
pub use config::ShowreelConfig;
pub use core::{Direction, Point, Rgba8, Vec2, Viewport, ViewportClass};
pub use error::{ShowreelError, ShowreelResult};
pub use gallery::{CardSequencer, GalleryCard, GalleryMode, Orientation};
pub use gesture::Key;
pub use listeners::{ListenerKind, ListenerRegistry, Owner};
pub use observer::{
    EndEdge, ObserverEvent, ObserverHandle, Refreshed, ScrollObserver, ScrollPolicy, StartEdge,
};
pub use runtime::{Ctx, Runtime, ScrollCommand};
pub use scene::{ElementId, Prop, Props, Scene, Style};
pub use shader::{CpuSurface, Effect, FrameInput, RenderSurface, SurfaceFactory, Texture, TextureSource};
pub use stage::{InputEvent, PageLayout, PageRefs, PointerHit, Script, Stage, StageSnapshot};
pub use timeline::{Position, Timeline};
