//! `SeaORM` Entity, @generated manually

use sea_orm::entity::prelude::*;

use crate::timeframe::Timeframe;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "time_periods")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub minutes: i32,
    #[sea_orm(nullable)]
    pub description: Option<String>,
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
    /// `None` when no exchange timeframe exists for this duration.
    pub fn timeframe(&self) -> Option<Timeframe> {
        Timeframe::from_minutes(i64::from(self.minutes))
    }
}
