//! Unit, country code and date conversions shared by the carrier formatters.
//!
//! Everything here is a pure function of its input.

use chrono::{DateTime, Offset, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::ShippingError;

/// ISO 3166-1 alpha-2 to alpha-3, ordered by alpha-2.
const COUNTRY_CODES: &[(&str, &str)] = &[
    ("AD", "AND"), ("AE", "ARE"), ("AF", "AFG"), ("AG", "ATG"), ("AI", "AIA"),
    ("AL", "ALB"), ("AM", "ARM"), ("AO", "AGO"), ("AQ", "ATA"), ("AR", "ARG"),
    ("AS", "ASM"), ("AT", "AUT"), ("AU", "AUS"), ("AW", "ABW"), ("AX", "ALA"),
    ("AZ", "AZE"), ("BA", "BIH"), ("BB", "BRB"), ("BD", "BGD"), ("BE", "BEL"),
    ("BF", "BFA"), ("BG", "BGR"), ("BH", "BHR"), ("BI", "BDI"), ("BJ", "BEN"),
    ("BL", "BLM"), ("BM", "BMU"), ("BN", "BRN"), ("BO", "BOL"), ("BQ", "BES"),
    ("BR", "BRA"), ("BS", "BHS"), ("BT", "BTN"), ("BV", "BVT"), ("BW", "BWA"),
    ("BY", "BLR"), ("BZ", "BLZ"), ("CA", "CAN"), ("CC", "CCK"), ("CD", "COD"),
    ("CF", "CAF"), ("CG", "COG"), ("CH", "CHE"), ("CI", "CIV"), ("CK", "COK"),
    ("CL", "CHL"), ("CM", "CMR"), ("CN", "CHN"), ("CO", "COL"), ("CR", "CRI"),
    ("CU", "CUB"), ("CV", "CPV"), ("CW", "CUW"), ("CX", "CXR"), ("CY", "CYP"),
    ("CZ", "CZE"), ("DE", "DEU"), ("DJ", "DJI"), ("DK", "DNK"), ("DM", "DMA"),
    ("DO", "DOM"), ("DZ", "DZA"), ("EC", "ECU"), ("EE", "EST"), ("EG", "EGY"),
    ("EH", "ESH"), ("ER", "ERI"), ("ES", "ESP"), ("ET", "ETH"), ("FI", "FIN"),
    ("FJ", "FJI"), ("FK", "FLK"), ("FM", "FSM"), ("FO", "FRO"), ("FR", "FRA"),
    ("GA", "GAB"), ("GB", "GBR"), ("GD", "GRD"), ("GE", "GEO"), ("GF", "GUF"),
    ("GG", "GGY"), ("GH", "GHA"), ("GI", "GIB"), ("GL", "GRL"), ("GM", "GMB"),
    ("GN", "GIN"), ("GP", "GLP"), ("GQ", "GNQ"), ("GR", "GRC"), ("GS", "SGS"),
    ("GT", "GTM"), ("GU", "GUM"), ("GW", "GNB"), ("GY", "GUY"), ("HK", "HKG"),
    ("HM", "HMD"), ("HN", "HND"), ("HR", "HRV"), ("HT", "HTI"), ("HU", "HUN"),
    ("ID", "IDN"), ("IE", "IRL"), ("IL", "ISR"), ("IM", "IMN"), ("IN", "IND"),
    ("IO", "IOT"), ("IQ", "IRQ"), ("IR", "IRN"), ("IS", "ISL"), ("IT", "ITA"),
    ("JE", "JEY"), ("JM", "JAM"), ("JO", "JOR"), ("JP", "JPN"), ("KE", "KEN"),
    ("KG", "KGZ"), ("KH", "KHM"), ("KI", "KIR"), ("KM", "COM"), ("KN", "KNA"),
    ("KP", "PRK"), ("KR", "KOR"), ("KW", "KWT"), ("KY", "CYM"), ("KZ", "KAZ"),
    ("LA", "LAO"), ("LB", "LBN"), ("LC", "LCA"), ("LI", "LIE"), ("LK", "LKA"),
    ("LR", "LBR"), ("LS", "LSO"), ("LT", "LTU"), ("LU", "LUX"), ("LV", "LVA"),
    ("LY", "LBY"), ("MA", "MAR"), ("MC", "MCO"), ("MD", "MDA"), ("ME", "MNE"),
    ("MF", "MAF"), ("MG", "MDG"), ("MH", "MHL"), ("MK", "MKD"), ("ML", "MLI"),
    ("MM", "MMR"), ("MN", "MNG"), ("MO", "MAC"), ("MP", "MNP"), ("MQ", "MTQ"),
    ("MR", "MRT"), ("MS", "MSR"), ("MT", "MLT"), ("MU", "MUS"), ("MV", "MDV"),
    ("MW", "MWI"), ("MX", "MEX"), ("MY", "MYS"), ("MZ", "MOZ"), ("NA", "NAM"),
    ("NC", "NCL"), ("NE", "NER"), ("NF", "NFK"), ("NG", "NGA"), ("NI", "NIC"),
    ("NL", "NLD"), ("NO", "NOR"), ("NP", "NPL"), ("NR", "NRU"), ("NU", "NIU"),
    ("NZ", "NZL"), ("OM", "OMN"), ("PA", "PAN"), ("PE", "PER"), ("PF", "PYF"),
    ("PG", "PNG"), ("PH", "PHL"), ("PK", "PAK"), ("PL", "POL"), ("PM", "SPM"),
    ("PN", "PCN"), ("PR", "PRI"), ("PS", "PSE"), ("PT", "PRT"), ("PW", "PLW"),
    ("PY", "PRY"), ("QA", "QAT"), ("RE", "REU"), ("RO", "ROU"), ("RS", "SRB"),
    ("RU", "RUS"), ("RW", "RWA"), ("SA", "SAU"), ("SB", "SLB"), ("SC", "SYC"),
    ("SD", "SDN"), ("SE", "SWE"), ("SG", "SGP"), ("SH", "SHN"), ("SI", "SVN"),
    ("SJ", "SJM"), ("SK", "SVK"), ("SL", "SLE"), ("SM", "SMR"), ("SN", "SEN"),
    ("SO", "SOM"), ("SR", "SUR"), ("SS", "SSD"), ("ST", "STP"), ("SV", "SLV"),
    ("SX", "SXM"), ("SY", "SYR"), ("SZ", "SWZ"), ("TC", "TCA"), ("TD", "TCD"),
    ("TF", "ATF"), ("TG", "TGO"), ("TH", "THA"), ("TJ", "TJK"), ("TK", "TKL"),
    ("TL", "TLS"), ("TM", "TKM"), ("TN", "TUN"), ("TO", "TON"), ("TR", "TUR"),
    ("TT", "TTO"), ("TV", "TUV"), ("TW", "TWN"), ("TZ", "TZA"), ("UA", "UKR"),
    ("UG", "UGA"), ("UM", "UMI"), ("US", "USA"), ("UY", "URY"), ("UZ", "UZB"),
    ("VA", "VAT"), ("VC", "VCT"), ("VE", "VEN"), ("VG", "VGB"), ("VI", "VIR"),
    ("VN", "VNM"), ("VU", "VUT"), ("WF", "WLF"), ("WS", "WSM"), ("YE", "YEM"),
    ("YT", "MYT"), ("ZA", "ZAF"), ("ZM", "ZMB"), ("ZW", "ZWE"),
];

/// Converts an ISO 3166-1 alpha-2 code to alpha-3.
///
/// # Errors
///
/// Returns `UnknownCountry` when the code is not in the ISO table.
pub fn country_alpha2_to_alpha3(code: &str) -> Result<&'static str, ShippingError> {
    let code = code.trim().to_ascii_uppercase();
    COUNTRY_CODES
        .binary_search_by(|(alpha2, _)| (*alpha2).cmp(code.as_str()))
        .map(|idx| COUNTRY_CODES[idx].1)
        .map_err(|_| ShippingError::UnknownCountry(code))
}

/// Converts an ISO 3166-1 alpha-3 code back to alpha-2.
pub fn country_alpha3_to_alpha2(code: &str) -> Result<&'static str, ShippingError> {
    let code = code.trim().to_ascii_uppercase();
    COUNTRY_CODES
        .iter()
        .find(|(_, alpha3)| *alpha3 == code)
        .map(|(alpha2, _)| *alpha2)
        .ok_or(ShippingError::UnknownCountry(code))
}

/// Checks the canonical two-letter country code of an address.
///
/// # Errors
///
/// Returns `InvalidAddress` if the code is missing or not exactly two characters.
pub fn checked_country_code(code: &str) -> Result<String, ShippingError> {
    let trimmed = code.trim();
    if trimmed.chars().count() != 2 {
        return Err(ShippingError::InvalidAddress(format!(
            "country code '{}' must be a 2-letter ISO code",
            code
        )));
    }
    Ok(trimmed.to_ascii_uppercase())
}

/// Formats a timestamp as `YYYY-MM-DDTHH:mm:ssGMT±HH:MM`.
///
/// The offset printed is the one carried by `date`. Callers that need the
/// machine's local offset convert with `with_timezone(&Local)` first.
pub fn format_date_time_with_gmt_offset<Tz: TimeZone>(date: &DateTime<Tz>) -> String {
    let offset_seconds = date.offset().fix().local_minus_utc();
    let sign = if offset_seconds >= 0 { '+' } else { '-' };
    let minutes = offset_seconds.abs() / 60;
    format!(
        "{}GMT{}{:02}:{:02}",
        date.naive_local().format("%Y-%m-%dT%H:%M:%S"),
        sign,
        minutes / 60,
        minutes % 60
    )
}

/// Units of mass accepted in the canonical model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MassUnit {
    #[serde(alias = "lbs")]
    Lb,
    #[serde(alias = "kgs")]
    Kg,
    Oz,
    G,
}

impl MassUnit {
    fn grams(self) -> f64 {
        match self {
            MassUnit::Lb => 453.592_37,
            MassUnit::Kg => 1000.0,
            MassUnit::Oz => 28.349_523_125,
            MassUnit::G => 1.0,
        }
    }

    /// Converts `value` expressed in `self` into `target`.
    pub fn convert(self, value: f64, target: MassUnit) -> f64 {
        if self == target {
            return value;
        }
        value * self.grams() / target.grams()
    }

    /// DHL `UnitOfMeasurement` code for shipments weighed in this unit.
    ///
    /// Imperial weights map to `SI`, metric weights to `SU`.
    pub fn dhl_unit_of_measurement(self) -> &'static str {
        match self {
            MassUnit::Lb | MassUnit::Oz => "SI",
            MassUnit::Kg | MassUnit::G => "SU",
        }
    }

    /// The unit DHL expects weights in for this unit family.
    pub fn dhl_base_unit(self) -> MassUnit {
        match self {
            MassUnit::Lb | MassUnit::Oz => MassUnit::Lb,
            MassUnit::Kg | MassUnit::G => MassUnit::Kg,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MassUnit::Lb => "lb",
            MassUnit::Kg => "kg",
            MassUnit::Oz => "oz",
            MassUnit::G => "g",
        }
    }
}

impl fmt::Display for MassUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Units of length accepted in the canonical model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    In,
    Cm,
}

impl DistanceUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            DistanceUnit::In => "in",
            DistanceUnit::Cm => "cm",
        }
    }
}

impl fmt::Display for DistanceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
