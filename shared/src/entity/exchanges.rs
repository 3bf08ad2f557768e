//! `SeaORM` Entity, @generated manually

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "exchanges")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    /// Routing code used to pick a market data adapter ("binance", "okx", ...)
    pub code: String,
    pub environment: String, // "production" or "sandbox"
    #[sea_orm(nullable)]
    pub api_key: Option<String>,
    #[sea_orm(nullable)]
    pub api_secret: Option<String>,
    #[sea_orm(nullable)]
    pub api_passphrase: Option<String>,
    pub is_active: bool,
    pub created_at: Option<DateTimeUtc>,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::candles::Entity")]
    Candles,
}

impl Related<super::candles::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Candles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_sandbox(&self) -> bool {
        self.environment.eq_ignore_ascii_case("sandbox")
    }
}
