//! 主体访问适配
//!
//! 规则按名称引用主体的字段和方法。每种主体类型在启动时注册一份 [`SubjectSchema`]，
//! 其中保存字段读写函数和可调用方法，评估器和执行器只通过它按名称访问主体。
//!
//! ```ignore
//! static SCHEMA: LazyLock<SubjectSchema<Order>> = LazyLock::new(|| {
//!     SubjectSchema::new("Order")
//!         .field("Amount", |o: &Order| o.amount, |o, v| o.amount = v)
//!         .method_with("ApplyDiscount", |o: &mut Order, pct: Decimal| o.apply_discount(pct))
//! });
//! ```

use crate::error::{Result, RuleError};
use crate::value::{FieldKind, FieldType, FieldValue, RecordField};
use futures::future::BoxFuture;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// 可被规则评估的主体
pub trait Subject: Sized + Send + Sync + 'static {
    /// 该类型注册的访问表
    fn schema() -> &'static SubjectSchema<Self>;

    /// 主体类型标签，用于从规则存储中筛选规则
    fn target_type() -> &'static str {
        Self::schema().target_type()
    }
}

/// 方法调用结果
pub enum Invocation {
    /// 同步完成
    Completed,
    /// 仍在进行的异步操作，执行器会等待其完成后再执行下一个动作
    Pending(BoxFuture<'static, Result<()>>),
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "Completed"),
            Self::Pending(_) => write!(f, "Pending"),
        }
    }
}

/// 方法参数形态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodParam {
    None,
    Scalar(FieldKind),
    Record(Vec<RecordField>),
}

type Getter<T> = Box<dyn Fn(&T) -> FieldValue + Send + Sync>;
type Setter<T> = Box<dyn Fn(&mut T, FieldValue) -> Result<()> + Send + Sync>;
type Method<T> = Box<dyn Fn(&mut T, Option<FieldValue>) -> Result<Invocation> + Send + Sync>;

struct FieldAccessor<T> {
    kind: FieldKind,
    get: Getter<T>,
    set: Option<Setter<T>>,
}

struct MethodAccessor<T> {
    param: MethodParam,
    invoke: Method<T>,
}

/// 主体访问表
pub struct SubjectSchema<T> {
    target_type: String,
    fields: HashMap<String, FieldAccessor<T>>,
    methods: HashMap<String, MethodAccessor<T>>,
}

impl<T: 'static> SubjectSchema<T> {
    pub fn new(target_type: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
            fields: HashMap::new(),
            methods: HashMap::new(),
        }
    }

    /// 注册可读写字段
    pub fn field<V, G, S>(mut self, name: &str, get: G, set: S) -> Self
    where
        V: FieldType + 'static,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let setter: Setter<T> = Box::new(move |subject: &mut T, value: FieldValue| {
            set(subject, V::from_value(value)?);
            Ok(())
        });

        self.fields.insert(
            name.to_string(),
            FieldAccessor {
                kind: V::KIND,
                get: Box::new(move |subject: &T| get(subject).into_value()),
                set: Some(setter),
            },
        );
        self
    }

    /// 注册只读字段
    pub fn readonly_field<V, G>(mut self, name: &str, get: G) -> Self
    where
        V: FieldType + 'static,
        G: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.fields.insert(
            name.to_string(),
            FieldAccessor {
                kind: V::KIND,
                get: Box::new(move |subject: &T| get(subject).into_value()),
                set: None,
            },
        );
        self
    }

    /// 注册无参方法
    pub fn method<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&mut T) -> Result<()> + Send + Sync + 'static,
    {
        self.methods.insert(
            name.to_string(),
            MethodAccessor {
                param: MethodParam::None,
                invoke: Box::new(move |subject: &mut T, _: Option<FieldValue>| {
                    f(subject).map(|_| Invocation::Completed)
                }),
            },
        );
        self
    }

    /// 注册单个标量参数的方法
    pub fn method_with<V, F>(mut self, name: &str, f: F) -> Self
    where
        V: FieldType + 'static,
        F: Fn(&mut T, V) -> Result<()> + Send + Sync + 'static,
    {
        self.methods.insert(
            name.to_string(),
            MethodAccessor {
                param: MethodParam::Scalar(V::KIND),
                invoke: Box::new(move |subject: &mut T, arg: Option<FieldValue>| {
                    let value = V::from_value(arg.unwrap_or(FieldValue::Null))?;
                    f(subject, value).map(|_| Invocation::Completed)
                }),
            },
        );
        self
    }

    /// 注册单个记录参数的方法
    pub fn record_method<F>(mut self, name: &str, fields: Vec<RecordField>, f: F) -> Self
    where
        F: Fn(&mut T, BTreeMap<String, FieldValue>) -> Result<()> + Send + Sync + 'static,
    {
        self.methods.insert(
            name.to_string(),
            MethodAccessor {
                param: MethodParam::Record(fields),
                invoke: Box::new(move |subject: &mut T, arg: Option<FieldValue>| match arg {
                    Some(FieldValue::Record(record)) => {
                        f(subject, record).map(|_| Invocation::Completed)
                    }
                    other => Err(RuleError::TypeMismatch {
                        expected: "record".to_string(),
                        actual: other.map_or("none", |v| v.type_name()).to_string(),
                    }),
                }),
            },
        );
        self
    }

    /// 注册返回异步操作的无参方法
    pub fn async_method<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&mut T) -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        self.methods.insert(
            name.to_string(),
            MethodAccessor {
                param: MethodParam::None,
                invoke: Box::new(move |subject: &mut T, _: Option<FieldValue>| {
                    Ok(Invocation::Pending(f(subject)))
                }),
            },
        );
        self
    }

    pub fn target_type(&self) -> &str {
        &self.target_type
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// 字段声明的类型
    pub fn kind_of(&self, name: &str) -> Result<FieldKind> {
        self.accessor(name).map(|a| a.kind)
    }

    /// 可写字段的类型，只读字段返回 [`RuleError::ReadOnly`]
    pub fn writable_kind(&self, name: &str) -> Result<FieldKind> {
        let accessor = self.accessor(name)?;
        if accessor.set.is_none() {
            return Err(RuleError::ReadOnly(name.to_string()));
        }
        Ok(accessor.kind)
    }

    /// 读取字段，返回字段类型和当前值
    pub fn read(&self, subject: &T, name: &str) -> Result<(FieldKind, FieldValue)> {
        let accessor = self.accessor(name)?;
        Ok((accessor.kind, (accessor.get)(subject)))
    }

    pub fn get(&self, subject: &T, name: &str) -> Result<FieldValue> {
        self.read(subject, name).map(|(_, value)| value)
    }

    /// 写入字段
    pub fn set(&self, subject: &mut T, name: &str, value: FieldValue) -> Result<()> {
        let accessor = self.accessor(name)?;
        let setter = accessor
            .set
            .as_ref()
            .ok_or_else(|| RuleError::ReadOnly(name.to_string()))?;
        setter(subject, value)
    }

    /// 方法的参数形态
    pub fn method_param(&self, name: &str) -> Result<&MethodParam> {
        self.method_accessor(name).map(|m| &m.param)
    }

    /// 调用方法
    pub fn invoke(&self, subject: &mut T, name: &str, arg: Option<FieldValue>) -> Result<Invocation> {
        let method = self.method_accessor(name)?;
        (method.invoke)(subject, arg)
    }

    /// 生成主体所有字段的只读快照
    pub fn snapshot(&self, subject: &T) -> SubjectSnapshot {
        let fields = self
            .fields
            .iter()
            .map(|(name, accessor)| (name.clone(), (accessor.get)(subject)))
            .collect();

        SubjectSnapshot {
            target_type: self.target_type.clone(),
            fields,
        }
    }

    fn accessor(&self, name: &str) -> Result<&FieldAccessor<T>> {
        self.fields
            .get(name)
            .ok_or_else(|| RuleError::MemberNotFound(name.to_string()))
    }

    fn method_accessor(&self, name: &str) -> Result<&MethodAccessor<T>> {
        self.methods
            .get(name)
            .ok_or_else(|| RuleError::MemberNotFound(name.to_string()))
    }
}

/// 主体的只读快照，传递给自定义动作处理器
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectSnapshot {
    pub target_type: String,
    pub fields: BTreeMap<String, FieldValue>,
}

impl SubjectSnapshot {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::LazyLock;

    #[derive(Debug, Default)]
    struct Ticket {
        id: i64,
        title: String,
        note: Option<String>,
        closed: bool,
    }

    static TICKET_SCHEMA: LazyLock<SubjectSchema<Ticket>> = LazyLock::new(|| {
        SubjectSchema::new("Ticket")
            .readonly_field("Id", |t: &Ticket| t.id)
            .field("Title", |t: &Ticket| t.title.clone(), |t, v| t.title = v)
            .field("Note", |t: &Ticket| t.note.clone(), |t, v| t.note = v)
            .field("Closed", |t: &Ticket| t.closed, |t, v| t.closed = v)
            .method("Close", |t: &mut Ticket| {
                t.closed = true;
                Ok(())
            })
            .method_with("Rename", |t: &mut Ticket, title: String| {
                t.title = title;
                Ok(())
            })
    });

    impl Subject for Ticket {
        fn schema() -> &'static SubjectSchema<Self> {
            &TICKET_SCHEMA
        }
    }

    #[test]
    fn test_read_fields() {
        let ticket = Ticket {
            id: 7,
            title: "broken".to_string(),
            ..Default::default()
        };
        let schema = Ticket::schema();

        assert_eq!(Ticket::target_type(), "Ticket");
        assert_eq!(
            schema.read(&ticket, "Id").unwrap(),
            (FieldKind::Integer, FieldValue::Integer(7))
        );
        assert_eq!(schema.get(&ticket, "Note").unwrap(), FieldValue::Null);
        assert_eq!(schema.kind_of("Note").unwrap(), FieldKind::String);
    }

    #[test]
    fn test_missing_member_is_distinct_from_type_mismatch() {
        let mut ticket = Ticket::default();
        let schema = Ticket::schema();

        let missing = schema.set(&mut ticket, "Priority", FieldValue::Integer(1));
        assert!(matches!(missing, Err(RuleError::MemberNotFound(_))));

        let mismatch = schema.set(&mut ticket, "Closed", FieldValue::from("yes"));
        assert!(matches!(mismatch, Err(RuleError::TypeMismatch { .. })));

        let readonly = schema.set(&mut ticket, "Id", FieldValue::Integer(1));
        assert!(matches!(readonly, Err(RuleError::ReadOnly(_))));
        assert!(matches!(
            schema.writable_kind("Id"),
            Err(RuleError::ReadOnly(_))
        ));
    }

    #[test]
    fn test_set_optional_field() {
        let mut ticket = Ticket::default();
        let schema = Ticket::schema();

        schema
            .set(&mut ticket, "Note", FieldValue::from("call back"))
            .unwrap();
        assert_eq!(ticket.note.as_deref(), Some("call back"));

        schema.set(&mut ticket, "Note", FieldValue::Null).unwrap();
        assert_eq!(ticket.note, None);
    }

    #[test]
    fn test_invoke_methods() {
        let mut ticket = Ticket::default();
        let schema = Ticket::schema();

        assert_eq!(schema.method_param("Close").unwrap(), &MethodParam::None);
        assert!(matches!(
            schema.invoke(&mut ticket, "Close", None).unwrap(),
            Invocation::Completed
        ));
        assert!(ticket.closed);

        assert_eq!(
            schema.method_param("Rename").unwrap(),
            &MethodParam::Scalar(FieldKind::String)
        );
        schema
            .invoke(&mut ticket, "Rename", Some(FieldValue::from("fixed")))
            .unwrap();
        assert_eq!(ticket.title, "fixed");

        assert!(matches!(
            schema.invoke(&mut ticket, "Reopen", None),
            Err(RuleError::MemberNotFound(_))
        ));
    }

    #[test]
    fn test_snapshot() {
        let ticket = Ticket {
            id: 3,
            title: "printer".to_string(),
            ..Default::default()
        };
        let snapshot = Ticket::schema().snapshot(&ticket);

        assert_eq!(snapshot.target_type, "Ticket");
        assert_eq!(snapshot.get("Title"), Some(&FieldValue::from("printer")));
        assert_eq!(snapshot.fields.len(), 4);
    }
}
