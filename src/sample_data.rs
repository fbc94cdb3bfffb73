//! Fixed catalog served while the primary store is unconfigured or unreachable.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;

use crate::types::{Seller, Vehicle};

fn ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw).map(|t| t.with_timezone(&Utc)).unwrap_or_default()
}

fn seller(id: &str, name: &str, phone: &str, preset: &str, created: &str) -> Seller {
    Seller {
        id: id.to_string(),
        name: name.to_string(),
        phone_e164: phone.to_string(),
        wa_preset: Some(preset.to_string()),
        active: true,
        created_at: ts(created),
        updated_at: ts(created),
    }
}

lazy_static! {
    pub static ref SAMPLE_VEHICLES: Vec<Vehicle> = vec![
        Vehicle {
            id: "sample-ford-fiesta-2017".into(),
            slug: "ford-fiesta-2017".into(),
            title: "Ford Fiesta 1.6 SE".into(),
            brand: "Ford".into(),
            model: "Fiesta".into(),
            year: 2017,
            price_ars: Some(9_500_000),
            km: Some(82_000),
            fuel: Some("Nafta".into()),
            gearbox: Some("Manual".into()),
            location: Some("Córdoba".into()),
            description: Some(
                "Ford Fiesta en excelente estado, único dueño y servicios oficiales al día. Perfecto para ciudad y viajes cortos."
                    .into()
            ),
            images: vec![
                "https://images.unsplash.com/photo-1525609004556-c46c7d6cf023?auto=format&fit=crop&w=1200&q=80".into(),
                "https://images.unsplash.com/photo-1519641471654-76ce0107ad1b?auto=format&fit=crop&w=1200&q=80".into(),
            ],
            seller_id: "sample-seller-owner".into(),
            seller: seller(
                "sample-seller-owner",
                "Ana Pérez",
                "+5493515550000",
                "Hola! Me gustaría saber más del vehículo.",
                "2024-01-05T10:00:00Z",
            ),
            published: true,
            created_at: ts("2024-01-05T10:00:00Z"),
            updated_at: ts("2024-03-01T12:00:00Z"),
        },
        Vehicle {
            id: "sample-peugeot-208-2021".into(),
            slug: "peugeot-208-2021".into(),
            title: "Peugeot 208 Feline".into(),
            brand: "Peugeot".into(),
            model: "208".into(),
            year: 2021,
            price_ars: Some(18_200_000),
            km: Some(32_000),
            fuel: Some("Nafta".into()),
            gearbox: Some("Automática".into()),
            location: Some("Rosario".into()),
            description: Some(
                "Peugeot 208 Feline con techo panorámico, pantalla 10'' y ayuda al estacionamiento. Ideal para quien busca confort y tecnología."
                    .into()
            ),
            images: vec![
                "https://images.unsplash.com/photo-1542282088-fe8426682b8f?auto=format&fit=crop&w=1200&q=80".into(),
                "https://images.unsplash.com/photo-1511919884226-fd3cad34687c?auto=format&fit=crop&w=1200&q=80".into(),
            ],
            seller_id: "sample-seller-martin".into(),
            seller: seller(
                "sample-seller-martin",
                "Martín Gómez",
                "+5493414440000",
                "Hola! Vi el auto publicado y quiero más información.",
                "2024-02-10T09:00:00Z",
            ),
            published: true,
            created_at: ts("2024-02-10T09:00:00Z"),
            updated_at: ts("2024-02-22T16:30:00Z"),
        },
        Vehicle {
            id: "sample-toyota-corolla-2019".into(),
            slug: "toyota-corolla-2019".into(),
            title: "Toyota Corolla XEi".into(),
            brand: "Toyota".into(),
            model: "Corolla".into(),
            year: 2019,
            price_ars: Some(21_500_000),
            km: Some(61_000),
            fuel: Some("Híbrido".into()),
            gearbox: Some("Automática".into()),
            location: Some("Buenos Aires".into()),
            description: Some(
                "Corolla híbrido con mantenimiento realizado en concesionario oficial. Consumo súper eficiente y gran confort de marcha."
                    .into()
            ),
            images: vec![
                "https://images.unsplash.com/photo-1589396572781-44c1476ee712?auto=format&fit=crop&w=1200&q=80".into(),
                "https://images.unsplash.com/photo-1518364538800-6bae3c2ea0c1?auto=format&fit=crop&w=1200&q=80".into(),
                "https://images.unsplash.com/photo-1483721310020-03333e577078?auto=format&fit=crop&w=1200&q=80".into(),
            ],
            seller_id: "sample-seller-juana".into(),
            seller: seller(
                "sample-seller-juana",
                "Juana López",
                "+5491122334455",
                "Hola! Estoy interesado en el Corolla.",
                "2024-03-18T14:15:00Z",
            ),
            published: true,
            created_at: ts("2024-03-18T14:15:00Z"),
            updated_at: ts("2024-03-20T08:45:00Z"),
        },
    ];

    /// Sellers of the sample vehicles, de-duplicated by id in first-seen order.
    pub static ref SAMPLE_SELLERS: Vec<Seller> = {
        let mut sellers: Vec<Seller> = Vec::new();
        for vehicle in SAMPLE_VEHICLES.iter() {
            if !sellers.iter().any(|s| s.id == vehicle.seller.id) {
                sellers.push(vehicle.seller.clone());
            }
        }
        sellers
    };
}
