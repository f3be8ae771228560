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

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MessageQueue::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MessageQueue::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MessageQueue::UserId).string().not_null())
                    .col(ColumnDef::new(MessageQueue::HotelId).string())
                    .col(
                        ColumnDef::new(MessageQueue::MessageType)
                            .string()
                            .not_null()
                            .default("text"),
                    )
                    .col(
                        ColumnDef::new(MessageQueue::MessageContent)
                            .json()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MessageQueue::ScheduledTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MessageQueue::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(MessageQueue::SentTime).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(MessageQueue::RetryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(MessageQueue::CreatedAt)
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
                    .name("idx-queue-user-status")
                    .table(MessageQueue::Table)
                    .col(MessageQueue::UserId)
                    .col(MessageQueue::Status)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MessageQueue::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum MessageQueue {
    Table,
    Id,
    UserId,
    HotelId,
    MessageType,
    MessageContent,
    ScheduledTime,
    Status,
    SentTime,
    RetryCount,
    CreatedAt,
}
