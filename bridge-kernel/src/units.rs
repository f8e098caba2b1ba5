/**
 * UNITS - Conversion des valeurs brutes vers l'unité canonique de chaque capteur
 *
 * RÔLE :
 * Fonctions pures : (valeur, unité déclarée) -> valeur dans l'unité cible.
 * La conversion est choisie UNE fois à la construction du handler, jamais
 * par message.
 *
 * UNITÉS CANONIQUES :
 * - température : °C
 * - tension : V
 * - courant : A
 * - pression : hPa (pas de conversion, warning si l'unité diffère)
 *
 * Unité inconnue ou absente => identité.
 */

/// Conversion fixée à la construction d'un handler
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Conversion {
    Identity,
    KelvinToCelsius,
    /// arrondi à une décimale
    FahrenheitToCelsius,
    /// préfixes sous-multiples (milli, micro)
    Divide(f64),
    /// préfixes multiples (kilo)
    Multiply(f64),
}

impl Conversion {
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Conversion::Identity => value,
            Conversion::KelvinToCelsius => value - 273.15,
            Conversion::FahrenheitToCelsius => round_tenth((value - 32.0) * (5.0 / 9.0)),
            Conversion::Divide(divisor) => value / divisor,
            Conversion::Multiply(factor) => value * factor,
        }
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Température : "K" prioritaire sur "F", sinon on suppose des °C
pub fn temperature_conversion(unit: &str) -> Conversion {
    let upper = unit.to_uppercase();
    if upper.contains('K') {
        Conversion::KelvinToCelsius
    } else if upper.contains('F') {
        Conversion::FahrenheitToCelsius
    } else {
        Conversion::Identity
    }
}

/// Tension : V, mV, µV, kV
pub fn voltage_conversion(unit: &str) -> Conversion {
    prefixed_conversion(unit, 'v')
}

/// Courant : A, mA, µA, kA
pub fn current_conversion(unit: &str) -> Conversion {
    prefixed_conversion(unit, 'a')
}

fn prefixed_conversion(unit: &str, base: char) -> Conversion {
    let lower = unit.trim().to_lowercase();
    let Some(prefix) = lower.strip_suffix(base) else {
        return Conversion::Identity;
    };
    match prefix {
        "" => Conversion::Identity,
        "m" => Conversion::Divide(1e3),
        // 'u', micro sign (U+00B5) et mu grec (U+03BC)
        "u" | "\u{b5}" | "\u{3bc}" => Conversion::Divide(1e6),
        "k" => Conversion::Multiply(1e3),
        _ => Conversion::Identity,
    }
}

/// La pression est toujours traitée comme des hPa
pub fn is_hectopascal(unit: &str) -> bool {
    unit.to_lowercase().contains("hpa")
}

/// Normalise la casse du label d'unité d'un capteur de signal
pub fn normalize_signal_unit(unit: &str) -> String {
    match unit.to_lowercase().as_str() {
        "dbm" => "dBm".to_string(),
        "db" => "dB".to_string(),
        _ => unit.to_string(),
    }
}
