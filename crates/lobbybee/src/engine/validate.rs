// Lobbybee
// Copyright (C) 2025 Lobbybee Contributors

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Input validation against the effective step.

use lobbybee_common::webhook::{InboundKind, InboundMessage};

use super::step::{EffectiveStep, MessageType};

pub const ID_PHOTO_STEP: &str = "ID Photo Upload";
pub const ID_PHOTO_REQUIRED: &str = "Please upload a photo of your ID document.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Validation {
    Valid,
    /// The input names another flow category to jump to.
    Jump(String),
    Invalid(String),
}

pub fn validate(step: &EffectiveStep, inbound: &InboundMessage) -> Validation {
    let input = inbound.text.trim();

    if step.step_name.eq_ignore_ascii_case(ID_PHOTO_STEP) {
        return match inbound.kind {
            InboundKind::Image => Validation::Valid,
            _ => Validation::Invalid(ID_PHOTO_REQUIRED.to_owned()),
        };
    }
    if step.message_type == MessageType::Media && inbound.kind.is_media() {
        return Validation::Valid;
    }
    if step.allowed_flow_categories.iter().any(|c| c == input) {
        return Validation::Jump(input.to_owned());
    }
    if step.has_options() && !step.is_option(input) {
        let keys: Vec<String> = step.option_keys().map(|k| format!("'{k}'")).collect();
        return Validation::Invalid(format!(
            "Invalid option. Please select from: {}",
            keys.join(", ")
        ));
    }
    Validation::Valid
}
