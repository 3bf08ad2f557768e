//! `SeaORM` Entity, @generated manually

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "currency_pairs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub base_symbol_id: i32,
    pub quote_symbol_id: i32,
    #[sea_orm(column_name = "type")]
    pub pair_type: String, // "spot" or "futures"
    pub is_active: bool,
    pub created_at: Option<DateTimeUtc>,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::symbols::Entity",
        from = "Column::BaseSymbolId",
        to = "super::symbols::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    BaseSymbol,
    #[sea_orm(
        belongs_to = "super::symbols::Entity",
        from = "Column::QuoteSymbolId",
        to = "super::symbols::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    QuoteSymbol,
    #[sea_orm(has_many = "super::candles::Entity")]
    Candles,
}

impl Related<super::candles::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Candles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
