//! Product, user and history types shared by the projection and the ledger
use super::error::CustodyError;
use chrono::{DateTime, TimeZone, Utc};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Lifecycle stage of a product. Declaration order is the stage order.
#[derive(
    minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[cbor(index_only)]
pub enum Status {
    #[n(0)]
    Created,
    #[n(1)]
    ReadyForShipping,
    #[n(2)]
    Shipped,
    #[n(3)]
    InTransit,
    #[n(4)]
    DeliveredToRetailer,
    #[n(5)]
    AvailableForSale,
    #[n(6)]
    Sold,
    #[n(7)]
    Recalled,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cbor(index_only)]
pub enum Role {
    #[n(0)]
    Manufacturer,
    #[n(1)]
    Distributor,
    #[n(2)]
    Retailer,
    #[n(3)]
    SuperAdmin,
}

// compared by instant, whatever the zone
#[derive(Debug, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

// Projection row. Ledger blocks carry the authoritative record of the same events.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Product {
    #[n(0)]
    pub product_id: String, // bech32 encoded uuid7, prefix "prod_"
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub description: String,
    #[n(3)]
    pub owner: String, // set once on creation
    #[n(4)]
    pub custodian: String,
    #[n(5)]
    pub current_status: Status,
    #[n(6)]
    pub created_at: TimeStamp<Utc>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct User {
    #[n(0)]
    pub username: String,
    #[n(1)]
    pub role: Role,
}

/// One entry of a product's audit trail, kept outside the ledger for fast lookups.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    #[n(0)]
    pub product_id: String,
    #[n(1)]
    pub status: Status,
    #[n(2)]
    pub by: String,
    #[n(3)]
    pub timestamp: TimeStamp<Utc>,
    #[n(4)]
    pub latitude: Option<f64>,
    #[n(5)]
    pub longitude: Option<f64>,
}

impl Status {
    pub const ALL: [Status; 8] = [
        Status::Created,
        Status::ReadyForShipping,
        Status::Shipped,
        Status::InTransit,
        Status::DeliveredToRetailer,
        Status::AvailableForSale,
        Status::Sold,
        Status::Recalled,
    ];

    /// Position of the stage in the lifecycle, `Created` is 0.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Created => "Created",
            Status::ReadyForShipping => "ReadyForShipping",
            Status::Shipped => "Shipped",
            Status::InTransit => "InTransit",
            Status::DeliveredToRetailer => "DeliveredToRetailer",
            Status::AvailableForSale => "AvailableForSale",
            Status::Sold => "Sold",
            Status::Recalled => "Recalled",
        }
    }
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Manufacturer => "manufacturer",
            Role::Distributor => "distributor",
            Role::Retailer => "retailer",
            Role::SuperAdmin => "super_admin",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = CustodyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CustodyError::Validation(format!("unknown status '{s}'")))
    }
}

impl FromStr for Role {
    type Err = CustodyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manufacturer" => Ok(Role::Manufacturer),
            "distributor" => Ok(Role::Distributor),
            "retailer" => Ok(Role::Retailer),
            "super_admin" => Ok(Role::SuperAdmin),
            other => Err(CustodyError::Validation(format!("unknown role '{other}'"))),
        }
    }
}

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl<T: TimeZone> PartialEq for TimeStamp<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T: TimeZone> Eq for TimeStamp<T> {}

impl<T: TimeZone> PartialOrd for TimeStamp<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: TimeZone> Ord for TimeStamp<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

impl Product {
    /// A freshly created product: the creator is both owner and custodian.
    pub fn new(product_id: String, name: String, description: String, creator: String) -> Self {
        Self {
            product_id,
            name,
            description,
            owner: creator.clone(),
            custodian: creator,
            current_status: Status::Created,
            created_at: TimeStamp::new(),
        }
    }
}

impl User {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }
}

impl HistoryRecord {
    pub fn new(
        product_id: String,
        status: Status,
        by: String,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Self {
        Self {
            product_id,
            status,
            by,
            timestamp: TimeStamp::new(),
            latitude,
            longitude,
        }
    }
}
