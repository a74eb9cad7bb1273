use crate::error::DoctorError;
use bytes::Bytes;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(Bytes),
    Placeholder(String),
}

/// A static document skeleton: literal fragments interleaved with `{{name}}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, DoctorError> {
        let mut segments = Vec::new();
        let mut rest = source;

        while let Some(start) = rest.find(OPEN) {
            if start > 0 {
                segments.push(Segment::Literal(Bytes::copy_from_slice(
                    rest[..start].as_bytes(),
                )));
            }
            let after_open = &rest[start + OPEN.len()..];
            let end = after_open.find(CLOSE).ok_or_else(|| {
                DoctorError::InvalidArgument(format!(
                    "unclosed placeholder at byte {} of the template",
                    source.len() - rest.len() + start
                ))
            })?;

            let name = after_open[..end].trim();
            let valid = !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if !valid {
                return Err(DoctorError::InvalidArgument(format!(
                    "invalid placeholder name `{name}`"
                )));
            }
            segments.push(Segment::Placeholder(name.to_owned()));
            rest = &after_open[end + CLOSE.len()..];
        }

        if !rest.is_empty() {
            segments.push(Segment::Literal(Bytes::copy_from_slice(rest.as_bytes())));
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use rstest::rstest;

    fn literal(text: &'static str) -> Segment {
        Segment::Literal(Bytes::from_static(text.as_bytes()))
    }

    #[test]
    fn test_parse_interleaved() {
        let template = Template::parse(r#"{"a":{{first}},"b":{{ second }}}"#).unwrap();
        assert_eq!(
            template.segments(),
            &[
                literal(r#"{"a":"#),
                Segment::Placeholder("first".into()),
                literal(r#","b":"#),
                Segment::Placeholder("second".into()),
                literal("}"),
            ]
        );
        assert_eq!(template.placeholders().collect::<Vec<_>>(), ["first", "second"]);
    }

    #[test]
    fn test_parse_literal_only() {
        let template = Template::parse("<p>no slots { here }</p>").unwrap();
        assert_eq!(template.segments(), &[literal("<p>no slots { here }</p>")]);
        assert!(Template::parse("").unwrap().segments().is_empty());
    }

    #[rstest]
    #[case::unclosed("<p>{{data</p>")]
    #[case::empty("{{ }}")]
    #[case::invalid_name("{{a b}}")]
    fn test_parse_rejects(#[case] source: &str) {
        let err = Template::parse(source).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
