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

pub use super::conversation_context::Entity as ConversationContext;
pub use super::conversation_message::Entity as ConversationMessage;
pub use super::flow_step::Entity as FlowStep;
pub use super::flow_step_template::Entity as FlowStepTemplate;
pub use super::flow_template::Entity as FlowTemplate;
pub use super::guest::Entity as Guest;
pub use super::hotel::Entity as Hotel;
pub use super::message_queue::Entity as MessageQueue;
pub use super::notification::Entity as Notification;
pub use super::placeholder::Entity as Placeholder;
pub use super::stay::Entity as Stay;
pub use super::webhook_log::Entity as WebhookLog;
pub use super::whatsapp_media::Entity as WhatsappMedia;
