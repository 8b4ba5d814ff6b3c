//! Study chat server - Library exports for testing
//!
//! (c) Softlandia 2025

pub mod api;
pub mod config;
pub mod core;
pub mod infrastructure;

use crate::core::assistant::AnswerTask;
use tokio::sync::OnceCell;
use tokio::sync::mpsc;

pub static TASK_SENDER: OnceCell<mpsc::Sender<AnswerTask>> = OnceCell::const_new();
