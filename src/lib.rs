// ABOUTME: Library root for the FaleComJesus backend server
// ABOUTME: Exposes credential encryption, LLM provider dispatch, chat orchestration and HTTP routes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 FaleComJesus

//! # FaleComJesus Server
//!
//! Multi-tenant backend for a devotional chat application. Users store one
//! encrypted API credential per LLM provider; chat turns decrypt the
//! credential, render a prompt from an optional template plus conversation
//! history, and dispatch to the matching provider adapter (OpenAI, Anthropic,
//! Google, Mistral, or a generic OpenAI-shaped fallback).

pub mod auth;
pub mod chat;
pub mod config;
pub mod credentials;
pub mod crypto;
pub mod database;
pub mod errors;
pub mod llm;
pub mod logging;
pub mod models;
pub mod routes;
pub mod server;
