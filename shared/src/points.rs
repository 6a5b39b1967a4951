use crate::model::Coordinates;

/// A fixed routing destination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointOfInterest {
    pub name: &'static str,
    pub coordinates: Coordinates,
}

pub const TABLE_MOUNTAIN: PointOfInterest = PointOfInterest {
    name: "Table Mountain Aerial Cableway",
    coordinates: Coordinates::new(-33.9648, 18.4031),
};

pub const WATERFRONT: PointOfInterest = PointOfInterest {
    name: "V&A Waterfront",
    coordinates: Coordinates::new(-33.9036, 18.4204),
};

pub const CAPE_POINT: PointOfInterest = PointOfInterest {
    name: "Cape Point",
    coordinates: Coordinates::new(-34.3568, 18.4975),
};

pub static POINTS_OF_INTEREST: [PointOfInterest; 3] = [TABLE_MOUNTAIN, WATERFRONT, CAPE_POINT];
