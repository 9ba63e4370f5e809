// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::service::GatewayService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<GatewayService>,
    /// Cancelled on shutdown; every invocation runs under a child token.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(service: GatewayService, shutdown: CancellationToken) -> Self {
        Self {
            service: Arc::new(service),
            shutdown,
        }
    }
}
