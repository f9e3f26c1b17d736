//! pixelforge — sparse layered sprite/animation editor core.
//!
//! The document model is a stack of [`canvas::Layer`]s over a list of
//! animation frames, each frame holding one sparse [`grid::PixelGrid`] per
//! layer. On top of that sit the [`compositor`] (flatten to dense RGBA),
//! the [`selection`] engine (shapes, lasso, wand, moves, clipboard), a
//! bounded [`history`] log, `.pforge` JSON snapshots ([`io`]) and a
//! self-contained GIF89a encoder ([`gif`] over [`lzw`]).
//!
//! [`project::Project`] ties one document together with its undo log; the
//! `pixelforge` binary drives everything headlessly through [`cli`].

pub mod canvas;
pub mod cli;
pub mod compositor;
pub mod gif;
pub mod grid;
pub mod history;
pub mod io;
pub mod logger;
pub mod lzw;
pub mod project;
pub mod selection;
