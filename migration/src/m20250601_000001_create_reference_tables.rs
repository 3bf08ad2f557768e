use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Symbols::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Symbols::Id).integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(Symbols::Name).string().not_null())
                    .col(ColumnDef::new(Symbols::Symbol).string_len(32).not_null().unique_key())
                    .col(ColumnDef::new(Symbols::Description).string().null())
                    .col(ColumnDef::new(Symbols::IsActive).boolean().not_null().default(true))
                    .col(ColumnDef::new(Symbols::CreatedAt).timestamp().null().default(Expr::current_timestamp()))
                    .col(ColumnDef::new(Symbols::UpdatedAt).timestamp().null().default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Exchanges::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Exchanges::Id).integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(Exchanges::Name).string().not_null())
                    .col(ColumnDef::new(Exchanges::Code).string_len(64).not_null())
                    .col(ColumnDef::new(Exchanges::Environment).string_len(32).not_null().default("production")) // production/sandbox
                    .col(ColumnDef::new(Exchanges::ApiKey).string().null())
                    .col(ColumnDef::new(Exchanges::ApiSecret).string().null())
                    .col(ColumnDef::new(Exchanges::ApiPassphrase).string().null())
                    .col(ColumnDef::new(Exchanges::IsActive).boolean().not_null().default(true))
                    .col(ColumnDef::new(Exchanges::CreatedAt).timestamp().null().default(Expr::current_timestamp()))
                    .col(ColumnDef::new(Exchanges::UpdatedAt).timestamp().null().default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CurrencyPairs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(CurrencyPairs::Id).integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(CurrencyPairs::BaseSymbolId).integer().not_null())
                    .col(ColumnDef::new(CurrencyPairs::QuoteSymbolId).integer().not_null())
                    .col(ColumnDef::new(CurrencyPairs::Type).string_len(16).not_null().default("spot")) // spot/futures
                    .col(ColumnDef::new(CurrencyPairs::IsActive).boolean().not_null().default(true))
                    .col(ColumnDef::new(CurrencyPairs::CreatedAt).timestamp().null().default(Expr::current_timestamp()))
                    .col(ColumnDef::new(CurrencyPairs::UpdatedAt).timestamp().null().default(Expr::current_timestamp()))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_currency_pairs_base_symbol")
                            .from(CurrencyPairs::Table, CurrencyPairs::BaseSymbolId)
                            .to(Symbols::Table, Symbols::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_currency_pairs_quote_symbol")
                            .from(CurrencyPairs::Table, CurrencyPairs::QuoteSymbolId)
                            .to(Symbols::Table, Symbols::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_currency_pairs_base_quote")
                    .table(CurrencyPairs::Table)
                    .col(CurrencyPairs::BaseSymbolId)
                    .col(CurrencyPairs::QuoteSymbolId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TimePeriods::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(TimePeriods::Id).integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(TimePeriods::Name).string().not_null())
                    .col(ColumnDef::new(TimePeriods::Minutes).integer().not_null())
                    .col(ColumnDef::new(TimePeriods::Description).string().null())
                    .col(ColumnDef::new(TimePeriods::IsActive).boolean().not_null().default(true))
                    .col(ColumnDef::new(TimePeriods::CreatedAt).timestamp().null().default(Expr::current_timestamp()))
                    .col(ColumnDef::new(TimePeriods::UpdatedAt).timestamp().null().default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TimePeriods::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CurrencyPairs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Exchanges::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Symbols::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Symbols {
    Table,
    Id,
    Name,
    Symbol,
    Description,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Exchanges {
    Table,
    Id,
    Name,
    Code,
    Environment,
    ApiKey,
    ApiSecret,
    ApiPassphrase,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum CurrencyPairs {
    Table,
    Id,
    BaseSymbolId,
    QuoteSymbolId,
    Type,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum TimePeriods {
    Table,
    Id,
    Name,
    Minutes,
    Description,
    IsActive,
    CreatedAt,
    UpdatedAt,
}
