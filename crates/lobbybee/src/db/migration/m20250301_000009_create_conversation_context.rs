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

use super::updated_at_trigger;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ConversationContext::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ConversationContext::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ConversationContext::UserId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ConversationContext::HotelId).string())
                    .col(ColumnDef::new(ConversationContext::CurrentStepId).integer())
                    .col(
                        ColumnDef::new(ConversationContext::NavigationStack)
                            .json()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConversationContext::ContextData)
                            .json()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConversationContext::ErrorCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ConversationContext::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(ConversationContext::LastActivity)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConversationContext::LastGuestMessageAt)
                            .timestamp_with_time_zone(),
                    )
                    .col(
                        ColumnDef::new(ConversationContext::FlowExpiresAt)
                            .timestamp_with_time_zone(),
                    )
                    .col(
                        ColumnDef::new(ConversationContext::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConversationContext::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        let db = manager.get_connection();

        // One row per (user, hotel); platform-level contexts have no hotel.
        db.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_context_user_hotel
            ON conversation_context (user_id, COALESCE(hotel_id, ''));",
        )
        .await?;
        db.execute_unprepared(&updated_at_trigger("conversation_context"))
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ConversationContext::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ConversationContext {
    Table,
    Id,
    UserId,
    HotelId,
    CurrentStepId,
    NavigationStack,
    ContextData,
    ErrorCount,
    IsActive,
    LastActivity,
    LastGuestMessageAt,
    FlowExpiresAt,
    CreatedAt,
    UpdatedAt,
}
