//! Recursive-descent decoder for class, method and field signatures.
//!
//! One method per grammar production. Type-variable references are resolved
//! against the declaration being parsed first, then the enclosing
//! [`TypeVariableScope`], so every `TypeVariable` names its declaring owner.

use crate::model::TypeName;

use super::{
    Bound, ClassSignature, FormalTypeParameter, MethodSignature, SignatureError, TypeSignature,
    TypeVariable, TypeVariableOwner,
};

/// Enclosing declarations visible to a signature, innermost last.
#[derive(Debug, Clone, Default)]
pub struct TypeVariableScope {
    frames: Vec<(TypeVariableOwner, Vec<FormalTypeParameter>)>,
}

impl TypeVariableScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, owner: TypeVariableOwner, parameters: Vec<FormalTypeParameter>) {
        self.frames.push((owner, parameters));
    }

    pub fn with(mut self, owner: TypeVariableOwner, parameters: Vec<FormalTypeParameter>) -> Self {
        self.push(owner, parameters);
        self
    }

    /// Innermost declaration of `name`.
    pub fn lookup(&self, name: &str) -> Option<(&TypeVariableOwner, &FormalTypeParameter)> {
        self.frames.iter().rev().find_map(|(owner, params)| {
            params.iter().find(|p| p.name == name).map(|p| (owner, p))
        })
    }

    /// The formal parameter a resolved variable refers to.
    pub fn declaration(&self, variable: &TypeVariable) -> Option<&FormalTypeParameter> {
        self.frames
            .iter()
            .filter(|(owner, _)| *owner == variable.owner)
            .find_map(|(_, params)| params.iter().find(|p| p.name == variable.name))
    }
}

pub fn parse_class_signature(
    signature: &str,
    class: &TypeName,
    scope: &TypeVariableScope,
) -> Result<ClassSignature, SignatureError> {
    let owner = TypeVariableOwner::Class {
        class: class.clone(),
    };
    let mut parser = SignatureParser::new(signature, scope, owner);
    let sig = parser.class_signature()?;
    parser.finish()?;
    Ok(sig)
}

pub fn parse_method_signature(
    signature: &str,
    owner: TypeVariableOwner,
    scope: &TypeVariableScope,
) -> Result<MethodSignature, SignatureError> {
    let mut parser = SignatureParser::new(signature, scope, owner);
    let sig = parser.method_signature()?;
    parser.finish()?;
    Ok(sig)
}

/// Field signatures and single reference types; also accepts plain descriptors.
pub fn parse_field_signature(
    signature: &str,
    scope: &TypeVariableScope,
) -> Result<TypeSignature, SignatureError> {
    let owner = TypeVariableOwner::Class {
        class: TypeName::new(""),
    };
    let mut parser = SignatureParser::new(signature, scope, owner);
    let sig = parser.java_type()?;
    parser.finish()?;
    Ok(sig)
}

pub fn descriptor_parameter_count(desc: &str) -> Result<usize, SignatureError> {
    let owner = TypeVariableOwner::Method {
        class: TypeName::new(""),
        name: String::new(),
        desc: desc.to_string(),
    };
    parse_method_signature(desc, owner, &TypeVariableScope::new()).map(|m| m.parameters.len())
}

struct SignatureParser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    scope: &'a TypeVariableScope,
    owner: TypeVariableOwner,
    /// Names declared by `owner`; `None` while they are still being collected.
    declared: Option<Vec<String>>,
}

impl<'a> SignatureParser<'a> {
    fn new(input: &'a str, scope: &'a TypeVariableScope, owner: TypeVariableOwner) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            scope,
            owner,
            declared: Some(Vec::new()),
        }
    }

    // --- Cursor ---

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn expect(&mut self, c: u8, expected: &'static str) -> Result<(), SignatureError> {
        match self.peek() {
            Some(found) if found == c => {
                self.advance();
                Ok(())
            }
            Some(found) => Err(self.unexpected(found, expected)),
            None => Err(self.end(expected)),
        }
    }

    fn unexpected(&self, found: u8, expected: &'static str) -> SignatureError {
        SignatureError::Unexpected {
            input: self.input.to_string(),
            position: self.pos,
            found: found as char,
            expected,
        }
    }

    fn end(&self, expected: &'static str) -> SignatureError {
        SignatureError::UnexpectedEnd {
            input: self.input.to_string(),
            expected,
        }
    }

    /// Read up to (not including) any terminator byte.
    fn identifier(
        &mut self,
        terminators: &[u8],
        expected: &'static str,
    ) -> Result<&'a str, SignatureError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if terminators.contains(&c) {
                break;
            }
            self.advance();
        }
        if self.peek().is_none() {
            return Err(self.end(expected));
        }
        if self.pos == start {
            return Err(self.unexpected(self.bytes[self.pos], expected));
        }
        Ok(&self.input[start..self.pos])
    }

    fn finish(&self) -> Result<(), SignatureError> {
        if self.pos == self.bytes.len() {
            Ok(())
        } else {
            Err(SignatureError::TrailingInput {
                input: self.input.to_string(),
                position: self.pos,
            })
        }
    }

    // --- Declarations ---

    fn class_signature(&mut self) -> Result<ClassSignature, SignatureError> {
        let type_parameters = self.type_parameters_if_present()?;
        let superclass = self.class_type()?;
        let mut interfaces = Vec::new();
        while self.peek().is_some() {
            interfaces.push(self.class_type()?);
        }
        Ok(ClassSignature {
            type_parameters,
            superclass: Some(superclass),
            interfaces,
        })
    }

    fn method_signature(&mut self) -> Result<MethodSignature, SignatureError> {
        let type_parameters = self.type_parameters_if_present()?;
        self.expect(b'(', "`(`")?;
        let mut parameters = Vec::new();
        loop {
            match self.peek() {
                Some(b')') => break,
                Some(_) => parameters.push(self.java_type()?),
                None => return Err(self.end("`)`")),
            }
        }
        self.advance();
        let return_type = self.return_type()?;
        let mut exceptions = Vec::new();
        while self.peek() == Some(b'^') {
            self.advance();
            exceptions.push(self.exception_type()?);
        }
        Ok(MethodSignature {
            type_parameters,
            parameters,
            return_type,
            exceptions,
        })
    }

    /// Formal type parameters are parsed twice: the first pass collects the
    /// declared names so bounds may reference later parameters.
    fn type_parameters_if_present(&mut self) -> Result<Vec<FormalTypeParameter>, SignatureError> {
        if self.peek() != Some(b'<') {
            return Ok(Vec::new());
        }
        let start = self.pos;
        self.declared = None;
        let collected = self.formal_type_parameters()?;
        self.declared = Some(collected.into_iter().map(|p| p.name).collect());
        self.pos = start;
        self.formal_type_parameters()
    }

    fn formal_type_parameters(&mut self) -> Result<Vec<FormalTypeParameter>, SignatureError> {
        self.expect(b'<', "`<`")?;
        let mut params = Vec::new();
        loop {
            match self.peek() {
                Some(b'>') => break,
                Some(_) => params.push(self.formal_type_parameter()?),
                None => return Err(self.end("`>`")),
            }
        }
        self.advance();
        Ok(params)
    }

    fn formal_type_parameter(&mut self) -> Result<FormalTypeParameter, SignatureError> {
        let name = self.identifier(b":", "type parameter name")?.to_string();
        let bound = self.class_bound()?;
        let mut interface_bounds = Vec::new();
        while self.peek() == Some(b':') {
            interface_bounds.push(self.interface_bound()?);
        }
        Ok(FormalTypeParameter {
            name,
            bound,
            interface_bounds,
        })
    }

    fn class_bound(&mut self) -> Result<Option<TypeSignature>, SignatureError> {
        self.expect(b':', "`:`")?;
        match self.peek() {
            Some(b'L' | b'T' | b'[') => self.reference_type().map(Some),
            _ => Ok(None),
        }
    }

    fn interface_bound(&mut self) -> Result<TypeSignature, SignatureError> {
        self.expect(b':', "`:`")?;
        self.reference_type()
    }

    fn return_type(&mut self) -> Result<TypeSignature, SignatureError> {
        if self.peek() == Some(b'V') {
            self.advance();
            return Ok(TypeSignature::plain(TypeName::new("void")));
        }
        self.java_type()
    }

    fn exception_type(&mut self) -> Result<TypeSignature, SignatureError> {
        match self.peek() {
            Some(b'T') => self.type_variable(),
            Some(b'L') => self.class_type(),
            Some(c) => Err(self.unexpected(c, "exception type")),
            None => Err(self.end("exception type")),
        }
    }

    // --- Types ---

    fn java_type(&mut self) -> Result<TypeSignature, SignatureError> {
        match self.peek() {
            Some(b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z') => self.base_type(),
            _ => self.reference_type(),
        }
    }

    fn reference_type(&mut self) -> Result<TypeSignature, SignatureError> {
        match self.peek() {
            Some(b'L') => self.class_type(),
            Some(b'T') => self.type_variable(),
            Some(b'[') => self.array_type(),
            Some(c) => Err(self.unexpected(c, "reference type")),
            None => Err(self.end("reference type")),
        }
    }

    fn base_type(&mut self) -> Result<TypeSignature, SignatureError> {
        let c = self.peek().ok_or_else(|| self.end("base type"))?;
        let type_name =
            TypeName::primitive(c as char).ok_or_else(|| self.unexpected(c, "base type"))?;
        self.advance();
        Ok(TypeSignature::plain(type_name))
    }

    fn array_type(&mut self) -> Result<TypeSignature, SignatureError> {
        self.expect(b'[', "`[`")?;
        let mut element = self.java_type()?;
        element.array_depth += 1;
        Ok(element)
    }

    /// `Lpkg/Outer<..>.Inner<..>;` keeps the innermost arguments.
    fn class_type(&mut self) -> Result<TypeSignature, SignatureError> {
        self.expect(b'L', "`L`")?;
        let mut name = self.identifier(b"<.;", "class name")?.to_string();
        let mut args = self.type_arguments_if_present()?;
        while self.peek() == Some(b'.') {
            self.advance();
            let inner = self.identifier(b"<.;", "inner class name")?;
            name.push('$');
            name.push_str(inner);
            args = self.type_arguments_if_present()?;
        }
        self.expect(b';', "`;`")?;
        Ok(TypeSignature::plain(TypeName::from_internal(&name)).with_args(args))
    }

    fn type_arguments_if_present(&mut self) -> Result<Vec<TypeSignature>, SignatureError> {
        if self.peek() != Some(b'<') {
            return Ok(Vec::new());
        }
        self.advance();
        let mut args = Vec::new();
        loop {
            match self.peek() {
                Some(b'>') => break,
                Some(_) => args.push(self.type_argument()?),
                None => return Err(self.end("`>`")),
            }
        }
        self.advance();
        Ok(args)
    }

    fn type_argument(&mut self) -> Result<TypeSignature, SignatureError> {
        let bound = match self.peek() {
            Some(b'*') => {
                self.advance();
                let mut any = TypeSignature::plain(TypeName::new("java.lang.Object"));
                any.bound = Bound::Unbounded;
                return Ok(any);
            }
            Some(b'+') => Bound::Extends,
            Some(b'-') => Bound::Super,
            _ => Bound::Exact,
        };
        if bound != Bound::Exact {
            self.advance();
        }
        let mut arg = self.reference_type()?;
        arg.bound = bound;
        Ok(arg)
    }

    fn type_variable(&mut self) -> Result<TypeSignature, SignatureError> {
        self.expect(b'T', "`T`")?;
        let name = self.identifier(b";", "type variable name")?.to_string();
        self.advance();
        let owner = self.resolve_variable(&name)?;
        Ok(TypeSignature::variable(TypeVariable { name, owner }))
    }

    fn resolve_variable(&self, name: &str) -> Result<TypeVariableOwner, SignatureError> {
        match &self.declared {
            None => return Ok(self.owner.clone()),
            Some(names) if names.iter().any(|n| n == name) => return Ok(self.owner.clone()),
            Some(_) => {}
        }
        self.scope
            .lookup(name)
            .map(|(owner, _)| owner.clone())
            .ok_or_else(|| SignatureError::UnboundTypeVariable {
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{ArgType, SignatureKind};
    use pretty_assertions::assert_eq;

    fn class_owner(name: &str) -> TypeVariableOwner {
        TypeVariableOwner::Class {
            class: TypeName::new(name),
        }
    }

    #[test]
    fn class_signature_with_bounded_parameter() {
        let sig = parse_class_signature(
            concat!(
                "<T:Ljava/lang/Number;:Ljava/lang/Comparable<TT;>;>",
                "Ljava/lang/Object;Ljava/io/Serializable;"
            ),
            &TypeName::new("app.Box"),
            &TypeVariableScope::new(),
        )
        .unwrap();
        assert_eq!(sig.type_parameters.len(), 1);
        let t = &sig.type_parameters[0];
        assert_eq!(t.name, "T");
        assert_eq!(t.bound.as_ref().unwrap().to_string(), "Number");
        assert_eq!(t.interface_bounds[0].to_string(), "Comparable<T>");
        match &t.interface_bounds[0].args[0].arg {
            ArgType::Var(v) => assert_eq!(v.owner, class_owner("app.Box")),
            other => panic!("expected type variable, got {other:?}"),
        }
        assert_eq!(sig.interfaces.len(), 1);
    }

    #[test]
    fn forward_reference_in_bounds() {
        let sig = parse_class_signature(
            "<K::Ljava/lang/Comparable<TV;>;V:Ljava/lang/Object;>Ljava/lang/Object;",
            &TypeName::new("app.Pair"),
            &TypeVariableScope::new(),
        )
        .unwrap();
        assert_eq!(sig.type_parameters.len(), 2);
        assert!(sig.type_parameters[0].bound.is_none());
    }

    #[test]
    fn method_variable_shadows_class_variable() {
        let scope = TypeVariableScope::new().with(
            class_owner("app.Repo"),
            vec![FormalTypeParameter {
                name: "T".to_string(),
                bound: None,
                interface_bounds: Vec::new(),
            }],
        );
        let method_owner = TypeVariableOwner::Method {
            class: TypeName::new("app.Repo"),
            name: "find".to_string(),
            desc: "(Ljava/lang/Object;)Ljava/lang/Object;".to_string(),
        };
        let sig = parse_method_signature(
            "<T:Ljava/lang/Object;>(TT;)Ljava/util/List<TT;>;^Ljava/io/IOException;",
            method_owner.clone(),
            &scope,
        )
        .unwrap();
        match &sig.parameters[0].arg {
            ArgType::Var(v) => assert_eq!(v.owner, method_owner),
            other => panic!("expected type variable, got {other:?}"),
        }
        assert_eq!(sig.return_type.to_string(), "List<T>");
        assert_eq!(sig.exceptions.len(), 1);
    }

    #[test]
    fn class_variables_resolve_through_scope() {
        let scope = TypeVariableScope::new().with(
            class_owner("app.Repo"),
            vec![FormalTypeParameter {
                name: "E".to_string(),
                bound: None,
                interface_bounds: Vec::new(),
            }],
        );
        let field = parse_field_signature("Ljava/util/List<TE;>;", &scope).unwrap();
        match &field.args[0].arg {
            ArgType::Var(v) => {
                assert_eq!(v.owner, class_owner("app.Repo"));
                assert!(scope.declaration(v).is_some());
            }
            other => panic!("expected type variable, got {other:?}"),
        }
    }

    #[test]
    fn unbound_variable_fails() {
        let err = parse_field_signature("TX;", &TypeVariableScope::new()).unwrap_err();
        assert_eq!(
            err,
            SignatureError::UnboundTypeVariable {
                name: "X".to_string()
            }
        );
    }

    #[test]
    fn descriptors_are_signatures() {
        assert_eq!(descriptor_parameter_count("(Ljava/lang/String;[IJ)V").unwrap(), 3);
        assert_eq!(descriptor_parameter_count("()V").unwrap(), 0);
        let arr = parse_field_signature("[[Ljava/lang/String;", &TypeVariableScope::new()).unwrap();
        assert_eq!(arr.kind(), SignatureKind::Array);
        assert_eq!(arr.array_depth, 2);
    }

    #[test]
    fn inner_class_keeps_innermost_arguments() {
        let sig = parse_field_signature(
            "Ljava/util/Map<Ljava/lang/String;Ljava/lang/Long;>.Entry<Ljava/lang/Integer;>;",
            &TypeVariableScope::new(),
        )
        .unwrap();
        assert_eq!(sig.type_name(), Some(&TypeName::new("java.util.Map$Entry")));
        assert_eq!(sig.args.len(), 1);
    }

    #[test]
    fn malformed_signatures() {
        let scope = TypeVariableScope::new();
        assert!(matches!(
            parse_field_signature("Ljava/util/List<Ljava/lang/String;", &scope),
            Err(SignatureError::UnexpectedEnd { .. })
        ));
        assert!(matches!(
            parse_field_signature("Q", &scope),
            Err(SignatureError::Unexpected { found: 'Q', .. })
        ));
        assert!(matches!(
            parse_field_signature("Ljava/lang/String;I", &scope),
            Err(SignatureError::TrailingInput { position: 18, .. })
        ));
        assert!(descriptor_parameter_count("(I").is_err());
    }
}
