use axum::Json;
use serde_json::{Value, json};

// Static reference data for building listing forms and search filters.
// Served as plain JSON; the ids here are the values the search filters and
// `sub_category` accept.

pub const VEHICLE_SUB_CATEGORIES: &[&str] = &["car", "motorcycle", "scooter", "quad"];
pub const PROPERTY_SUB_CATEGORIES: &[&str] = &["rent", "flatshare", "sale"];

pub const FUEL_TYPES: &[&str] = &["petrol", "diesel", "electric", "hybrid", "lpg", "ethanol"];
pub const TRANSMISSIONS: &[&str] = &["manual", "automatic"];
pub const VEHICLE_TYPES: &[&str] = &[
    "city_car",
    "sedan",
    "estate",
    "suv",
    "coupe",
    "convertible",
    "minivan",
    "utility",
    "pickup",
];
pub const PROPERTY_TYPES: &[&str] = &["apartment", "house", "studio", "loft", "land", "parking"];

pub const CAR_BRANDS: &[&str] = &[
    "Audi",
    "BMW",
    "Citroën",
    "Dacia",
    "Fiat",
    "Ford",
    "Honda",
    "Hyundai",
    "Kia",
    "Mercedes-Benz",
    "Nissan",
    "Opel",
    "Peugeot",
    "Renault",
    "Seat",
    "Skoda",
    "Tesla",
    "Toyota",
    "Volkswagen",
    "Volvo",
];

pub const MOTORCYCLE_BRANDS: &[&str] = &[
    "Aprilia",
    "BMW",
    "Ducati",
    "Harley-Davidson",
    "Honda",
    "Kawasaki",
    "KTM",
    "Piaggio",
    "Suzuki",
    "Triumph",
    "Yamaha",
];

pub async fn catalog() -> Json<Value> {
    Json(json!({
        "categories": [
            {
                "id": "vehicle",
                "sub_categories": VEHICLE_SUB_CATEGORIES,
                "fuel_types": FUEL_TYPES,
                "transmissions": TRANSMISSIONS,
                "vehicle_types": VEHICLE_TYPES,
                "brands": {
                    "car": CAR_BRANDS,
                    "motorcycle": MOTORCYCLE_BRANDS,
                },
            },
            {
                "id": "property",
                "sub_categories": PROPERTY_SUB_CATEGORIES,
                "property_types": PROPERTY_TYPES,
            },
        ]
    }))
}
