use std::collections::HashSet;
use std::sync::OnceLock;

/// Frozen lexical reference for one language version.
///
/// Pure data: three membership sets plus a version label. Everything that
/// classifies tokens borrows one of these, so a different language version is
/// supplied by handing over a different value rather than editing shared state.
#[derive(Debug, Clone)]
pub struct LanguageReference {
    pub version: &'static str,
    keywords: HashSet<&'static str>,
    builtins: HashSet<&'static str>,
    special_methods: HashSet<&'static str>,
}

impl LanguageReference {
    pub fn new(
        version: &'static str,
        keywords: &[&'static str],
        builtins: &[&'static str],
        special_methods: &[&'static str],
    ) -> Self {
        Self {
            version,
            keywords: keywords.iter().copied().collect(),
            builtins: builtins.iter().copied().collect(),
            special_methods: special_methods.iter().copied().collect(),
        }
    }

    pub fn is_keyword(&self, s: &str) -> bool {
        self.keywords.contains(s)
    }

    pub fn is_builtin(&self, s: &str) -> bool {
        self.builtins.contains(s)
    }

    pub fn is_special_method(&self, s: &str) -> bool {
        self.special_methods.contains(s)
    }

    pub fn keywords(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.keywords.iter().copied()
    }

    pub fn builtins(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.builtins.iter().copied()
    }

    pub fn special_methods(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.special_methods.iter().copied()
    }
}

/// Resolve a reference by its short name (`py312`, also accepting `3.12`).
pub fn lookup(name: &str) -> Option<&'static LanguageReference> {
    match name.trim().to_ascii_lowercase().as_str() {
        "py312" | "python3.12" | "3.12" => Some(py312()),
        _ => None,
    }
}

/// Python 3.12, frozen. Keywords come from `Lib/keyword.py` (hard + soft),
/// builtins from the builtin functions, constants/types and exceptions pages,
/// special methods from the data model reference.
pub fn py312() -> &'static LanguageReference {
    static REF: OnceLock<LanguageReference> = OnceLock::new();
    REF.get_or_init(|| {
        let builtins: Vec<&'static str> = PY312_BUILTIN_FUNCTIONS
            .iter()
            .chain(PY312_BUILTIN_CONSTANTS_AND_TYPES)
            .chain(PY312_BUILTIN_EXCEPTIONS)
            .copied()
            .collect();
        let keywords: Vec<&'static str> = PY312_HARD_KEYWORDS
            .iter()
            .chain(PY312_SOFT_KEYWORDS)
            .copied()
            .collect();
        LanguageReference::new(
            "Python 3.12 (frozen)",
            &keywords,
            &builtins,
            PY312_SPECIAL_METHODS,
        )
    })
}

const PY312_HARD_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

// Soft keywords are matched on surface text alone, without positional checks.
const PY312_SOFT_KEYWORDS: &[&str] = &["_", "case", "match", "type"];

const PY312_BUILTIN_FUNCTIONS: &[&str] = &[
    "abs", "aiter", "all", "anext", "any", "ascii", "bin", "bool", "breakpoint", "bytearray",
    "bytes", "callable", "chr", "classmethod", "compile", "complex", "delattr", "dict", "dir",
    "divmod", "enumerate", "eval", "exec", "filter", "float", "format", "frozenset", "getattr",
    "globals", "hasattr", "hash", "help", "hex", "id", "input", "int", "isinstance",
    "issubclass", "iter", "len", "list", "locals", "map", "max", "memoryview", "min", "next",
    "object", "oct", "open", "ord", "pow", "print", "property", "range", "repr", "reversed",
    "round", "set", "setattr", "slice", "sorted", "staticmethod", "str", "sum", "super",
    "tuple", "type", "vars", "zip", "__import__", "__build_class__",
];

const PY312_BUILTIN_CONSTANTS_AND_TYPES: &[&str] = &[
    "None", "Ellipsis", "NotImplemented", "False", "True", "bool", "memoryview", "bytearray",
    "bytes", "classmethod", "complex", "dict", "enumerate", "filter", "float", "frozenset",
    "property", "int", "list", "map", "object", "range", "reversed", "set", "slice",
    "staticmethod", "str", "super", "tuple", "type", "zip",
];

const PY312_BUILTIN_EXCEPTIONS: &[&str] = &[
    "BaseException", "Exception", "ArithmeticError", "AssertionError", "AttributeError",
    "BlockingIOError", "BrokenPipeError", "BufferError", "BytesWarning", "ChildProcessError",
    "ConnectionAbortedError", "ConnectionError", "ConnectionRefusedError",
    "ConnectionResetError", "DeprecationWarning", "EOFError", "EncodingWarning",
    "EnvironmentError", "FileExistsError", "FileNotFoundError", "FloatingPointError",
    "FutureWarning", "GeneratorExit", "OSError", "ImportError", "ImportWarning",
    "IndentationError", "IndexError", "InterruptedError", "IsADirectoryError", "KeyError",
    "KeyboardInterrupt", "LookupError", "MemoryError", "ModuleNotFoundError", "NameError",
    "NotImplementedError", "OverflowError", "PendingDeprecationWarning", "PermissionError",
    "ProcessLookupError", "RecursionError", "ReferenceError", "ResourceWarning",
    "RuntimeError", "RuntimeWarning", "StopAsyncIteration", "StopIteration", "SyntaxError",
    "SyntaxWarning", "SystemError", "SystemExit", "TabError", "TimeoutError", "TypeError",
    "UnboundLocalError", "UnicodeDecodeError", "UnicodeEncodeError", "UnicodeError",
    "UnicodeTranslateError", "UnicodeWarning", "UserWarning", "ValueError", "Warning",
    "ZeroDivisionError", "BaseExceptionGroup", "ExceptionGroup",
];

const PY312_SPECIAL_METHODS: &[&str] = &[
    // basic customization
    "__init__", "__new__", "__del__", "__repr__", "__str__", "__bytes__", "__format__",
    "__lt__", "__le__", "__eq__", "__ne__", "__gt__", "__ge__", "__hash__", "__bool__",
    "__getattribute__", "__getattr__", "__setattr__", "__delattr__", "__dir__",
    "__set_name__", "__init_subclass__", "__prepare__", "__instancecheck__",
    "__subclasscheck__", "__class_getitem__",
    // descriptors, callables
    "__get__", "__set__", "__delete__", "__call__",
    // containers
    "__len__", "__length_hint__", "__getitem__", "__setitem__", "__delitem__", "__iter__",
    "__reversed__", "__contains__", "__missing__",
    // numeric, binary
    "__add__", "__sub__", "__mul__", "__matmul__", "__truediv__", "__floordiv__", "__mod__",
    "__divmod__", "__pow__", "__lshift__", "__rshift__", "__and__", "__xor__", "__or__",
    "__radd__", "__rsub__", "__rmul__", "__rmatmul__", "__rtruediv__", "__rfloordiv__",
    "__rmod__", "__rdivmod__", "__rpow__", "__rlshift__", "__rrshift__", "__rand__",
    "__rxor__", "__ror__", "__iadd__", "__isub__", "__imul__", "__imatmul__",
    "__itruediv__", "__ifloordiv__", "__imod__", "__ipow__", "__ilshift__", "__irshift__",
    "__iand__", "__ixor__", "__ior__",
    // numeric, unary and conversion
    "__neg__", "__pos__", "__abs__", "__invert__", "__complex__", "__int__", "__float__",
    "__index__", "__round__", "__trunc__", "__floor__", "__ceil__",
    // context managers, async
    "__enter__", "__exit__", "__await__", "__aiter__", "__anext__", "__aenter__",
    "__aexit__", "__coroutine__",
    // buffers
    "__buffer__", "__release_buffer__",
    // classes, pickling, copying
    "__mro_entries__", "__getnewargs__", "__getnewargs_ex__", "__reduce__", "__reduce_ex__",
    "__copy__", "__deepcopy__",
    // attributes exposed on objects and types
    "__doc__", "__module__", "__name__", "__qualname__", "__class__", "__dict__",
    "__weakref__", "__bases__", "__mro__", "__subclasses__", "__sizeof__", "__fspath__",
];
