//! Moderation Bot Library
//!
//! A Telegram bot for group moderation.
//!
//! This crate provides the core functionality for:
//! - Parsing `/ban`, `/unban`, `/mute`, `/unmute`, `/tmute` and `/kick`
//! - Resolving the target user, reason and mute duration
//! - Gating every action on the invoker's admin rights
//! - Replying to `/repo` with a configurable card

pub mod commands;
pub mod config;
pub mod telegram;
