use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::models::AttributeKind;

/// Country names as spelled in the JHU case table, mapped to ISO 3166-1 alpha-3.
const COUNTRY_CODES: &[(&str, &str)] = &[
    ("Afghanistan", "AFG"),
    ("Albania", "ALB"),
    ("Algeria", "DZA"),
    ("Andorra", "AND"),
    ("Angola", "AGO"),
    ("Antigua and Barbuda", "ATG"),
    ("Argentina", "ARG"),
    ("Armenia", "ARM"),
    ("Australia", "AUS"),
    ("Austria", "AUT"),
    ("Azerbaijan", "AZE"),
    ("Bahamas", "BHS"),
    ("Bahrain", "BHR"),
    ("Bangladesh", "BGD"),
    ("Barbados", "BRB"),
    ("Belarus", "BLR"),
    ("Belgium", "BEL"),
    ("Belize", "BLZ"),
    ("Benin", "BEN"),
    ("Bhutan", "BTN"),
    ("Bolivia", "BOL"),
    ("Bosnia and Herzegovina", "BIH"),
    ("Botswana", "BWA"),
    ("Brazil", "BRA"),
    ("Brunei", "BRN"),
    ("Bulgaria", "BGR"),
    ("Burkina Faso", "BFA"),
    ("Burma", "MMR"),
    ("Burundi", "BDI"),
    ("Cabo Verde", "CPV"),
    ("Cambodia", "KHM"),
    ("Cameroon", "CMR"),
    ("Canada", "CAN"),
    ("Central African Republic", "CAF"),
    ("Chad", "TCD"),
    ("Chile", "CHL"),
    ("China", "CHN"),
    ("Colombia", "COL"),
    ("Comoros", "COM"),
    ("Congo (Brazzaville)", "COG"),
    ("Congo (Kinshasa)", "COD"),
    ("Costa Rica", "CRI"),
    ("Cote d'Ivoire", "CIV"),
    ("Croatia", "HRV"),
    ("Cuba", "CUB"),
    ("Cyprus", "CYP"),
    ("Czechia", "CZE"),
    ("Denmark", "DNK"),
    ("Djibouti", "DJI"),
    ("Dominica", "DMA"),
    ("Dominican Republic", "DOM"),
    ("Ecuador", "ECU"),
    ("Egypt", "EGY"),
    ("El Salvador", "SLV"),
    ("Equatorial Guinea", "GNQ"),
    ("Eritrea", "ERI"),
    ("Estonia", "EST"),
    ("Eswatini", "SWZ"),
    ("Ethiopia", "ETH"),
    ("Fiji", "FJI"),
    ("Finland", "FIN"),
    ("France", "FRA"),
    ("Gabon", "GAB"),
    ("Gambia", "GMB"),
    ("Georgia", "GEO"),
    ("Germany", "DEU"),
    ("Ghana", "GHA"),
    ("Greece", "GRC"),
    ("Grenada", "GRD"),
    ("Guatemala", "GTM"),
    ("Guinea", "GIN"),
    ("Guinea-Bissau", "GNB"),
    ("Guyana", "GUY"),
    ("Haiti", "HTI"),
    ("Honduras", "HND"),
    ("Hungary", "HUN"),
    ("Iceland", "ISL"),
    ("India", "IND"),
    ("Indonesia", "IDN"),
    ("Iran", "IRN"),
    ("Iraq", "IRQ"),
    ("Ireland", "IRL"),
    ("Israel", "ISR"),
    ("Italy", "ITA"),
    ("Jamaica", "JAM"),
    ("Japan", "JPN"),
    ("Jordan", "JOR"),
    ("Kazakhstan", "KAZ"),
    ("Kenya", "KEN"),
    ("Korea, South", "KOR"),
    ("Kuwait", "KWT"),
    ("Kyrgyzstan", "KGZ"),
    ("Laos", "LAO"),
    ("Latvia", "LVA"),
    ("Lebanon", "LBN"),
    ("Liberia", "LBR"),
    ("Libya", "LBY"),
    ("Liechtenstein", "LIE"),
    ("Lithuania", "LTU"),
    ("Luxembourg", "LUX"),
    ("Madagascar", "MDG"),
    ("Malawi", "MWI"),
    ("Malaysia", "MYS"),
    ("Maldives", "MDV"),
    ("Mali", "MLI"),
    ("Malta", "MLT"),
    ("Mauritania", "MRT"),
    ("Mauritius", "MUS"),
    ("Mexico", "MEX"),
    ("Moldova", "MDA"),
    ("Monaco", "MCO"),
    ("Mongolia", "MNG"),
    ("Montenegro", "MNE"),
    ("Morocco", "MAR"),
    ("Mozambique", "MOZ"),
    ("Namibia", "NAM"),
    ("Nepal", "NPL"),
    ("Netherlands", "NLD"),
    ("New Zealand", "NZL"),
    ("Nicaragua", "NIC"),
    ("Niger", "NER"),
    ("Nigeria", "NGA"),
    ("North Macedonia", "MKD"),
    ("Norway", "NOR"),
    ("Oman", "OMN"),
    ("Pakistan", "PAK"),
    ("Panama", "PAN"),
    ("Papua New Guinea", "PNG"),
    ("Paraguay", "PRY"),
    ("Peru", "PER"),
    ("Philippines", "PHL"),
    ("Poland", "POL"),
    ("Portugal", "PRT"),
    ("Qatar", "QAT"),
    ("Romania", "ROU"),
    ("Russia", "RUS"),
    ("Rwanda", "RWA"),
    ("Saint Kitts and Nevis", "KNA"),
    ("Saint Lucia", "LCA"),
    ("Saint Vincent and the Grenadines", "VCT"),
    ("San Marino", "SMR"),
    ("Sao Tome and Principe", "STP"),
    ("Saudi Arabia", "SAU"),
    ("Senegal", "SEN"),
    ("Serbia", "SRB"),
    ("Seychelles", "SYC"),
    ("Sierra Leone", "SLE"),
    ("Singapore", "SGP"),
    ("Slovakia", "SVK"),
    ("Slovenia", "SVN"),
    ("Somalia", "SOM"),
    ("South Africa", "ZAF"),
    ("South Sudan", "SSD"),
    ("Spain", "ESP"),
    ("Sri Lanka", "LKA"),
    ("Sudan", "SDN"),
    ("Suriname", "SUR"),
    ("Sweden", "SWE"),
    ("Switzerland", "CHE"),
    ("Syria", "SYR"),
    ("Taiwan*", "TWN"),
    ("Tanzania", "TZA"),
    ("Thailand", "THA"),
    ("Timor-Leste", "TLS"),
    ("Togo", "TGO"),
    ("Trinidad and Tobago", "TTO"),
    ("Tunisia", "TUN"),
    ("Turkey", "TUR"),
    ("US", "USA"),
    ("Uganda", "UGA"),
    ("Ukraine", "UKR"),
    ("United Arab Emirates", "ARE"),
    ("United Kingdom", "GBR"),
    ("Uruguay", "URY"),
    ("Uzbekistan", "UZB"),
    ("Venezuela", "VEN"),
    ("Vietnam", "VNM"),
    ("West Bank and Gaza", "PSE"),
    ("Western Sahara", "ESH"),
    ("Yemen", "YEM"),
    ("Zambia", "ZMB"),
    ("Zimbabwe", "ZWE"),
];

/// Resolves case-table country names to ISO3 codes.
#[derive(Debug, Clone)]
pub struct IsoResolver {
    codes: HashMap<String, String>,
}

impl Default for IsoResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl IsoResolver {
    pub fn new() -> Self {
        Self {
            codes: COUNTRY_CODES
                .iter()
                .map(|(name, code)| (name.to_lowercase(), code.to_string()))
                .collect(),
        }
    }

    /// Adds or replaces mappings, e.g. from the config file.
    pub fn with_overrides<'a, I>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (name, code) in overrides {
            self.codes
                .insert(name.trim().to_lowercase(), code.trim().to_uppercase());
        }
        self
    }

    /// ISO3 code for `country`; an unknown name is a lookup failure for `kind`.
    pub fn resolve(&self, country: &str, kind: AttributeKind) -> Result<&str> {
        let key = country.trim().to_lowercase();
        if let Some(code) = self.codes.get(&key) {
            return Ok(code.as_str());
        }
        // Names already given as a code pass through.
        let upper = country.trim().to_uppercase();
        self.codes
            .values()
            .find(|code| **code == upper)
            .map(String::as_str)
            .ok_or_else(|| Error::lookup(country, kind, "no ISO3 code for country name"))
    }
}
