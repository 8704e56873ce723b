/// Defines a path-safe string identifier.
///
/// # Syntax
/// ```ignore
/// define_id!(TypeName, "human readable kind");
/// ```
/// The generated type is a `#[serde(transparent)]` newtype over `String` that
/// implements [std::str::FromStr], [std::fmt::Display] and [AsRef<str>]. Parsing
/// rejects empty input and any character that would escape a URL path segment.
///
/// # Example
///
/// ```ignore
/// define_id!(VideoId, "video");
///
/// let video: VideoId = "42".parse()?;
/// let url = format!("api/courses/videos/{video}/track");
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident, $kind:literal) => {
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, ::serde::Serialize, ::serde::Deserialize,
        )]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::model::ParseIdError;

            fn from_str(input: &str) -> Result<Self, Self::Err> {
                $crate::model::validate_id(input, $kind).map(|id| Self(id.to_string()))
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::model::ParseIdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl ::std::convert::AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}
