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
use super::m20250301_000005_create_flow_template::FlowTemplate;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FlowStepTemplate::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FlowStepTemplate::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(FlowStepTemplate::FlowTemplateId)
                            .integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-step-template-flow")
                            .from(FlowStepTemplate::Table, FlowStepTemplate::FlowTemplateId)
                            .to(FlowTemplate::Table, FlowTemplate::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .col(ColumnDef::new(FlowStepTemplate::StepName).string().not_null())
                    .col(
                        ColumnDef::new(FlowStepTemplate::StepOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(FlowStepTemplate::MessageTemplate)
                            .json()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FlowStepTemplate::MessageType)
                            .string()
                            .not_null()
                            .default("text"),
                    )
                    .col(ColumnDef::new(FlowStepTemplate::Options).json().not_null())
                    .col(ColumnDef::new(FlowStepTemplate::Actions).json().not_null())
                    .col(ColumnDef::new(FlowStepTemplate::NextStepTemplateId).integer())
                    .col(
                        ColumnDef::new(FlowStepTemplate::ConditionalNextSteps)
                            .json()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FlowStepTemplate::AllowedFlowCategories)
                            .json()
                            .not_null(),
                    )
                    .col(ColumnDef::new(FlowStepTemplate::QuickReplyNavigation).json())
                    .col(
                        ColumnDef::new(FlowStepTemplate::IsCustomizable)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(FlowStepTemplate::MediaId).integer())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-step-template-media")
                            .from(FlowStepTemplate::Table, FlowStepTemplate::MediaId)
                            .to(WhatsappMedia::Table, WhatsappMedia::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .col(ColumnDef::new(FlowStepTemplate::DataKey).string())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FlowStepTemplate::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum FlowStepTemplate {
    Table,
    Id,
    FlowTemplateId,
    StepName,
    StepOrder,
    MessageTemplate,
    MessageType,
    Options,
    Actions,
    NextStepTemplateId,
    ConditionalNextSteps,
    AllowedFlowCategories,
    QuickReplyNavigation,
    IsCustomizable,
    MediaId,
    DataKey,
}
