//! Annotation session engine for labelling objects across a sequence of
//! video frames or images.
//!
//! The crate owns three things: the interaction state machine that turns raw
//! pointer and keyboard input into label lifecycle transitions, the track
//! linking engine that keeps one label per item per track, and the keyframe
//! interpolation engine that fills frames between manual edits. Durable
//! state lives behind a [`command::CommandBus`]; the session only reads
//! immutable snapshots and dispatches [`command::Command`]s.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`session`] | Interaction state machine, [`session::Session`] |
//! | [`drawable`] | Scratch arena of labels being drawn or edited |
//! | [`modifier`] | Modifier sub-sessions such as link-track mode |
//! | [`track`] | Link, unlink, merge and split of tracks |
//! | [`order`] | Label stacking order within an item |
//! | [`interp`] | Keyframe interpolation along a track |
//! | [`doc`] | Items, labels, shapes, tracks and the [`doc::State`] snapshot |
//! | [`command`] | Commands, patches and the bus trait |
//! | [`store`] | In-memory command bus |
//! | [`geom`] | Points, rectangles, paths and interpolation of geometry |
//! | [`input`] | Keys, pressed-key set and keymap |
//! | [`config`] | Session configuration from JSON or the environment |
//! | [`notice`] | User-facing notices and error codes |
//! | [`consts`] | Shared numeric constants |

pub mod command;
pub mod config;
pub mod consts;
pub mod doc;
pub mod drawable;
pub mod geom;
pub mod input;
pub mod interp;
pub mod modifier;
pub mod notice;
pub mod order;
pub mod session;
pub mod store;
pub mod track;

#[cfg(test)]
pub mod fixture;
