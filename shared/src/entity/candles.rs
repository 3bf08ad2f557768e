//! `SeaORM` Entity, @generated manually

use sea_orm::entity::prelude::*;
use rust_decimal::Decimal;

/// One OHLCV bucket. (currency_pair_id, exchange_id, time_period_id, open_time)
/// is the natural key and carries a unique index.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "candles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub currency_pair_id: i32,
    pub exchange_id: i32,
    pub time_period_id: i32,
    pub open_time: DateTimeUtc,
    pub close_time: DateTimeUtc,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub open_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub high_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub low_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub close_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((28, 8)))")]
    pub volume: Decimal,
    #[sea_orm(column_type = "Decimal(Some((28, 8)))")]
    pub quote_volume: Decimal,
    pub trades_count: i32,
    pub created_at: Option<DateTimeUtc>,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::currency_pairs::Entity",
        from = "Column::CurrencyPairId",
        to = "super::currency_pairs::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    CurrencyPairs,
    #[sea_orm(
        belongs_to = "super::exchanges::Entity",
        from = "Column::ExchangeId",
        to = "super::exchanges::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Exchanges,
    #[sea_orm(
        belongs_to = "super::time_periods::Entity",
        from = "Column::TimePeriodId",
        to = "super::time_periods::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    TimePeriods,
}

impl Related<super::currency_pairs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CurrencyPairs.def()
    }
}

impl Related<super::exchanges::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Exchanges.def()
    }
}

impl Related<super::time_periods::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TimePeriods.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
