use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_query::Expr;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Append-only audit trail of faucet dispatch attempts
        manager
            .create_table(
                Table::create()
                    .table(FaucetOutcomes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FaucetOutcomes::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(FaucetOutcomes::Identity)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FaucetOutcomes::RecipientAddress)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FaucetOutcomes::Result)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(FaucetOutcomes::TxHash).string_len(128).null())
                    .col(ColumnDef::new(FaucetOutcomes::FailureReason).text().null())
                    .col(
                        ColumnDef::new(FaucetOutcomes::Amount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FaucetOutcomes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_faucet_outcomes_address_time")
                    .table(FaucetOutcomes::Table)
                    .col(FaucetOutcomes::RecipientAddress)
                    .col(FaucetOutcomes::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_faucet_outcomes_identity_time")
                    .table(FaucetOutcomes::Table)
                    .col(FaucetOutcomes::Identity)
                    .col(FaucetOutcomes::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FaucetOutcomes::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum FaucetOutcomes {
    Table,
    Id,
    Identity,
    RecipientAddress,
    Result,
    TxHash,
    FailureReason,
    Amount,
    CreatedAt,
}
