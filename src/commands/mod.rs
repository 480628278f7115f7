// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod users;
pub mod cars;
pub mod shares;
pub mod categories;
pub mod expenses;
pub mod loan;
pub mod reports;
pub mod importer;
pub mod exporter;
pub mod settings;
pub mod doctor;
