use async_trait::async_trait;
use serde_yaml::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// 컨텍스트 인스턴스 상태이다. 시나리오 그래프 노드가 소유한다.
pub type ContextState = Box<dyn Any + Send>;

/// 시나리오마다 컨텍스트 인스턴스를 생성하는 추상 계층이다.
#[async_trait]
pub trait ContextFactory: Send + Sync {
    /// 생성자 파라미터(해석하지 않는 설정 값)를 받아 새 인스턴스를 만든다.
    async fn construct(&self, params: &Value) -> anyhow::Result<ContextState>;
}

/// 동기 클로저를 [`ContextFactory`]로 감싼다.
pub struct FnFactory<F>(F);

#[async_trait]
impl<F, T> ContextFactory for FnFactory<F>
where
    F: Fn(&Value) -> anyhow::Result<T> + Send + Sync,
    T: Any + Send,
{
    async fn construct(&self, params: &Value) -> anyhow::Result<ContextState> {
        let state = (self.0)(params)?;
        Ok(Box::new(state))
    }
}

/// 탐색 단계에서 제공되는 컨텍스트 클래스 선언이다.
#[derive(Clone)]
pub struct ContextClass {
    pub(crate) id: String,
    pub(crate) capabilities: Vec<String>,
    pub(crate) subcontexts: Vec<(String, String)>,
    pub(crate) factory: Arc<dyn ContextFactory>,
}

impl ContextClass {
    /// 동기 생성 함수로 클래스를 선언한다.
    pub fn new<F, T>(id: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&Value) -> anyhow::Result<T> + Send + Sync + 'static,
        T: Any + Send,
    {
        Self::with_factory(id, Arc::new(FnFactory(factory)))
    }

    /// `Default` 구현으로 인스턴스를 만드는 클래스를 선언한다.
    pub fn of_default<T>(id: impl Into<String>) -> Self
    where
        T: Default + Any + Send,
    {
        Self::new(id, |_params: &Value| Ok(T::default()))
    }

    /// 비동기 생성이 필요한 클래스를 선언한다.
    pub fn with_factory(id: impl Into<String>, factory: Arc<dyn ContextFactory>) -> Self {
        Self {
            id: id.into(),
            capabilities: Vec::new(),
            subcontexts: Vec::new(),
            factory,
        }
    }

    /// `resolve_by_capability`로 찾을 수 있는 태그를 추가한다.
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    /// 별칭 아래 서브컨텍스트를 선언한다. 선언 순서대로 생성된다.
    pub fn with_subcontext(mut self, alias: impl Into<String>, class: impl Into<String>) -> Self {
        self.subcontexts.push((alias.into(), class.into()));
        self
    }

    /// 클래스 ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// capability 태그 목록.
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// 선언된 (별칭, 클래스 ID) 목록.
    pub fn subcontexts(&self) -> &[(String, String)] {
        &self.subcontexts
    }
}

impl fmt::Debug for ContextClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextClass")
            .field("id", &self.id)
            .field("capabilities", &self.capabilities)
            .field("subcontexts", &self.subcontexts)
            .finish_non_exhaustive()
    }
}
