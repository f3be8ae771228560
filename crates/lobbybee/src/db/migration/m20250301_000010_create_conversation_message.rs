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

use sea_orm_migration::prelude::*;

use super::m20250301_000004_create_whatsapp_media::WhatsappMedia;
use super::m20250301_000009_create_conversation_context::ConversationContext;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ConversationMessage::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ConversationMessage::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ConversationMessage::ContextId)
                            .integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-message-context")
                            .from(ConversationMessage::Table, ConversationMessage::ContextId)
                            .to(ConversationContext::Table, ConversationContext::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .col(
                        ColumnDef::new(ConversationMessage::MessageContent)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConversationMessage::IsFromGuest)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConversationMessage::MessageType)
                            .string()
                            .not_null()
                            .default("text"),
                    )
                    .col(ColumnDef::new(ConversationMessage::MediaId).integer())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-message-media")
                            .from(ConversationMessage::Table, ConversationMessage::MediaId)
                            .to(WhatsappMedia::Table, WhatsappMedia::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .col(
                        ColumnDef::new(ConversationMessage::Timestamp)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-message-context")
                    .table(ConversationMessage::Table)
                    .col(ConversationMessage::ContextId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ConversationMessage::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ConversationMessage {
    Table,
    Id,
    ContextId,
    MessageContent,
    IsFromGuest,
    MessageType,
    MediaId,
    Timestamp,
}
