/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

pub mod fmt;
pub mod microseconds;
pub mod stats;

pub use microseconds::MicroSeconds;
