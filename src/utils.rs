//! # Utility Functions Module
//!
//! Macro `args!` per costruire i vettori di argomenti dei tool esterni
//! senza ripetere `.to_string()` su ogni elemento.

/// Builds a `Vec<String>` from items of any `Display` type.
///
/// ```rust
/// use media_normalizer::args;
///
/// let crf = 23;
/// let args = args!["-crf", crf, "-preset", "medium"];
/// assert_eq!(args, vec!["-crf", "23", "-preset", "medium"]);
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        {
            let items: ::std::vec::Vec<::std::string::String> =
                vec![$(::std::string::ToString::to_string(&$item)),*];
            items
        }
    };
}
