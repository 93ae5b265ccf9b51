//! Textdub - Scene-Bounded On-Screen Text Replacement
//!
//! A workflow for replacing on-screen text in videos with its translation:
//! scenes are detected up front, each scene's text is recognized and
//! translated once on its first frame, and every frame of the scene is
//! inpainted and re-lettered from that cached result.

pub mod cache;
pub mod cli;
pub mod compositor;
pub mod config;
pub mod error;
pub mod font;
pub mod frame;
pub mod inpaint;
pub mod layout;
pub mod pipeline;
pub mod recognize;
pub mod region;
pub mod scene;
pub mod translate;
pub mod video;
pub mod workflow;
