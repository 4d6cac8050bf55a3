//! Test doubles for exercising the run controller without a real engine.

mod scripted_engine;

pub use scripted_engine::ScriptedEngine;
