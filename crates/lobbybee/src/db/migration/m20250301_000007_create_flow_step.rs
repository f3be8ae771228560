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

use super::m20250301_000006_create_flow_step_template::FlowStepTemplate;
use super::updated_at_trigger;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FlowStep::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FlowStep::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FlowStep::TemplateId).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-flow-step-template")
                            .from(FlowStep::Table, FlowStep::TemplateId)
                            .to(FlowStepTemplate::Table, FlowStepTemplate::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .col(ColumnDef::new(FlowStep::HotelId).string())
                    .col(ColumnDef::new(FlowStep::MessageTemplate).json())
                    .col(ColumnDef::new(FlowStep::MessageType).string())
                    .col(ColumnDef::new(FlowStep::Options).json())
                    .col(ColumnDef::new(FlowStep::MediaId).integer())
                    .col(
                        ColumnDef::new(FlowStep::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(FlowStep::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FlowStep::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        let db = manager.get_connection();

        // A NULL hotel is a platform-level step and still counts as one key.
        db.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_flow_step_template_hotel
            ON flow_step (template_id, COALESCE(hotel_id, ''));",
        )
        .await?;
        db.execute_unprepared(&updated_at_trigger("flow_step"))
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FlowStep::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum FlowStep {
    Table,
    Id,
    TemplateId,
    HotelId,
    MessageTemplate,
    MessageType,
    Options,
    MediaId,
    IsActive,
    CreatedAt,
    UpdatedAt,
}
