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

pub mod prelude;

pub mod conversation_context;
pub mod conversation_message;
pub mod flow_step;
pub mod flow_step_template;
pub mod flow_template;
pub mod guest;
pub mod hotel;
pub mod message_queue;
pub mod notification;
pub mod placeholder;
pub mod stay;
pub mod webhook_log;
pub mod whatsapp_media;
