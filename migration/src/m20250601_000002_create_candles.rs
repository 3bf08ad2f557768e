use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DatabaseBackend;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let price = |column: Candles| decimal_column(backend, column, 20);
        let amount = |column: Candles| decimal_column(backend, column, 28);

        manager
            .create_table(
                Table::create()
                    .table(Candles::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Candles::Id).integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(Candles::CurrencyPairId).integer().not_null())
                    .col(ColumnDef::new(Candles::ExchangeId).integer().not_null())
                    .col(ColumnDef::new(Candles::TimePeriodId).integer().not_null())
                    .col(ColumnDef::new(Candles::OpenTime).date_time().not_null()) // inclusive bucket start, UTC
                    .col(ColumnDef::new(Candles::CloseTime).date_time().not_null())
                    .col(price(Candles::OpenPrice))
                    .col(price(Candles::HighPrice))
                    .col(price(Candles::LowPrice))
                    .col(price(Candles::ClosePrice))
                    .col(amount(Candles::Volume))
                    .col(amount(Candles::QuoteVolume).default(0))
                    .col(ColumnDef::new(Candles::TradesCount).integer().not_null().default(0))
                    .col(ColumnDef::new(Candles::CreatedAt).timestamp().null().default(Expr::current_timestamp()))
                    .col(ColumnDef::new(Candles::UpdatedAt).timestamp().null().default(Expr::current_timestamp()))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_candles_currency_pair")
                            .from(Candles::Table, Candles::CurrencyPairId)
                            .to(CurrencyPairs::Table, CurrencyPairs::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_candles_exchange")
                            .from(Candles::Table, Candles::ExchangeId)
                            .to(Exchanges::Table, Exchanges::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_candles_time_period")
                            .from(Candles::Table, Candles::TimePeriodId)
                            .to(TimePeriods::Table, TimePeriods::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Upserts are check-then-write; the natural key must still be unique at rest.
        manager
            .create_index(
                Index::create()
                    .name("idx_candles_natural_key")
                    .table(Candles::Table)
                    .col(Candles::CurrencyPairId)
                    .col(Candles::ExchangeId)
                    .col(Candles::TimePeriodId)
                    .col(Candles::OpenTime)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_candles_exchange_created")
                    .table(Candles::Table)
                    .col(Candles::ExchangeId)
                    .col(Candles::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Candles::Table).to_owned())
            .await
    }
}

/// Scale-8 decimal column. SQLite caps declared precision at 16.
fn decimal_column(backend: DatabaseBackend, column: Candles, precision: u32) -> ColumnDef {
    let precision = match backend {
        DatabaseBackend::Sqlite => precision.min(16),
        _ => precision,
    };
    ColumnDef::new(column).decimal_len(precision, 8).not_null().to_owned()
}

#[derive(DeriveIden)]
enum Candles {
    Table,
    Id,
    CurrencyPairId,
    ExchangeId,
    TimePeriodId,
    OpenTime,
    CloseTime,
    OpenPrice,
    HighPrice,
    LowPrice,
    ClosePrice,
    Volume,
    QuoteVolume,
    TradesCount,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum CurrencyPairs {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Exchanges {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum TimePeriods {
    Table,
    Id,
}
